//! Interactive monitor for a Rotel amplifier.
//!
//! ```text
//! cargo run --example monitor -- 192.168.1.50 [port]
//! ```
//!
//! Prints device events as they arrive and reads commands from stdin:
//! `vol <n>`, `mute on|off`, `source <token>`, `standby`, `state`, `quit`.

use rotel_ip::{ClientConfig, DeviceEvent, RotelClient};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().ok_or("usage: monitor <host> [port]")?;
    let port = args.next().map(|p| p.parse::<u16>()).transpose()?;

    let client = RotelClient::new(ClientConfig::default());
    let mut events = client.subscribe();
    client.connect(host, port)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event? {
                DeviceEvent::Connecting => println!("connecting..."),
                DeviceEvent::Connected(snapshot) => {
                    println!("connected: {}", serde_json::to_string(&snapshot)?);
                }
                DeviceEvent::Volume(volume) => println!("volume: {}", volume),
                DeviceEvent::Mute(muted) => println!("mute: {}", muted),
                DeviceEvent::Source(source) => println!("source: {}", source),
                DeviceEvent::Power(power) => println!("power: {}", power),
                DeviceEvent::Error(error) => println!("error: {}", error),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut words = line.split_whitespace();
                match (words.next(), words.next()) {
                    (Some("vol"), Some(value)) => match value.parse::<f64>() {
                        Ok(volume) => client.set_volume(volume)?,
                        Err(e) => println!("bad volume: {}", e),
                    },
                    (Some("mute"), Some(value)) => client.set_mute(value == "on")?,
                    (Some("source"), Some(token)) => client.set_source(token)?,
                    (Some("standby"), _) => client.standby()?,
                    (Some("state"), _) => {
                        println!("{}", serde_json::to_string_pretty(&client.state().await?)?);
                    }
                    (Some("quit"), _) => break,
                    (None, _) => {}
                    _ => println!("commands: vol <n>, mute on|off, source <token>, standby, state, quit"),
                }
            }
        }
    }

    client.disconnect()?;
    Ok(())
}
