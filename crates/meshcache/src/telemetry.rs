// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events emitted by cache groups.

use tracing::Level;

use crate::Error;

/// What happened while serving a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupActivity {
    Hit,
    Miss,
    Coalesced,
    PeerLoad,
    PeerError,
    LocalLoad,
    LocalError,
}

impl GroupActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "group.hit",
            Self::Miss => "group.miss",
            Self::Coalesced => "group.coalesced",
            Self::PeerLoad => "group.peer_load",
            Self::PeerError => "group.peer_error",
            Self::LocalLoad => "group.local_load",
            Self::LocalError => "group.local_error",
        }
    }

    pub(crate) fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Coalesced | Self::PeerLoad | Self::LocalLoad => Level::DEBUG,
            Self::PeerError => Level::WARN,
            Self::LocalError => Level::ERROR,
        }
    }
}

/// Emits one group event at the level of its activity.
pub(crate) fn record(group: &str, activity: GroupActivity, key: &str, error: Option<&Error>) {
    let name = activity.as_str();
    let error = error.map(tracing::field::display);

    // Tracing levels must be constant, so the level is selected by the macro.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                group.name = group,
                group.activity = name,
                group.key = key,
                error,
                "group.event"
            )
        };
    }

    match activity.level() {
        Level::ERROR => emit_event!(error),
        Level::WARN => emit_event!(warn),
        _ => emit_event!(debug),
    }
}
