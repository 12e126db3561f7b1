use crate::types::{Dialect, Volume};

/// Status queries understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Power,
    Volume,
    Source,
    Mute,
    /// Legacy dialect only
    VolumeMin,
    /// Legacy dialect only
    VolumeMax,
}

/// Outbound request vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PowerOn,
    PowerOff,
    /// Absolute volume, already clamped to the device bounds
    SetVolume(Volume),
    MuteOn,
    MuteOff,
    /// Select an input by its device token
    SelectSource(String),
    Query(Query),
}

impl Command {
    /// Render the command for the given dialect
    ///
    /// Commands always end with `!`, even in version 2 where notifications
    /// end with `$`. Returns `None` when the dialect has no such command.
    pub fn encode(&self, dialect: Dialect) -> Option<String> {
        let wire = match self {
            Command::PowerOn => "power_on!".to_string(),
            Command::PowerOff => "power_off!".to_string(),
            Command::SetVolume(volume) => match dialect {
                Dialect::V2 => format!("vol_{:02}!", volume),
                Dialect::Legacy => format!("volume_{}!", volume),
            },
            Command::MuteOn => "mute_on!".to_string(),
            Command::MuteOff => "mute_off!".to_string(),
            Command::SelectSource(token) => format!("{}!", token),
            Command::Query(query) => return query.encode(dialect),
        };
        Some(wire)
    }
}

impl Query {
    fn encode(self, dialect: Dialect) -> Option<String> {
        let wire = match (dialect, self) {
            (Dialect::V2, Query::Power) => "power?",
            (Dialect::V2, Query::Volume) => "volume?",
            (Dialect::V2, Query::Source) => "source?",
            (Dialect::V2, Query::Mute) => "mute?",
            (Dialect::V2, Query::VolumeMin | Query::VolumeMax) => return None,
            (Dialect::Legacy, Query::Power) => "get_current_power!",
            (Dialect::Legacy, Query::Volume) => "get_volume!",
            (Dialect::Legacy, Query::Source) => "get_current_source!",
            (Dialect::Legacy, Query::Mute) => "get_mute_status!",
            (Dialect::Legacy, Query::VolumeMin) => "get_volume_min!",
            (Dialect::Legacy, Query::VolumeMax) => "get_volume_max!",
        };
        Some(wire.to_string())
    }

    /// Queries sent when the device powers on
    pub fn power_on_refresh(dialect: Dialect) -> &'static [Query] {
        match dialect {
            Dialect::V2 => &[Query::Mute, Query::Source, Query::Volume],
            Dialect::Legacy => &[
                Query::VolumeMin,
                Query::VolumeMax,
                Query::Mute,
                Query::Source,
                Query::Volume,
            ],
        }
    }

    /// Queries sent on every poll tick of an established connection
    pub fn poll(dialect: Dialect) -> &'static [Query] {
        match dialect {
            Dialect::V2 => &[Query::Power, Query::Mute, Query::Source, Query::Volume],
            Dialect::Legacy => &[Query::Power],
        }
    }
}

/// Encode a sequence of commands into one write, skipping unsupported ones
pub fn encode_all<'a>(commands: impl IntoIterator<Item = &'a Command>, dialect: Dialect) -> String {
    commands
        .into_iter()
        .filter_map(|command| command.encode(dialect))
        .collect()
}

/// Wrap queries as commands
pub fn queries(list: &[Query]) -> Vec<Command> {
    list.iter().copied().map(Command::Query).collect()
}
