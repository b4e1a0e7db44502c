//! Contact and message event traces
//!
//! One event per line, whitespace separated, `#` starts a comment:
//!
//! ```text
//! # time  kind  fields...
//! 0.0     CONN  n1 n2 up
//! 12.5    C     M1 n1 n3 1024
//! 40.0    CONN  n1 n2 down
//! ```
//!
//! Events are kept in time order; events sharing a timestamp keep their
//! order from the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use oppnet_core::{IdentityError, MessageId, PeerIdentity, SimTime};
use thiserror::Error;

/// Errors raised while reading a trace
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read trace {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: {source}")]
    Identity {
        line: usize,
        #[source]
        source: IdentityError,
    },
}

/// One scheduled event
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent<I: PeerIdentity> {
    /// A contact between two hosts opens or closes
    Connection { time: SimTime, a: I, b: I, up: bool },
    /// A message is created at `from`
    Create {
        time: SimTime,
        id: MessageId,
        from: I,
        to: I,
        size: usize,
    },
}

impl<I: PeerIdentity> TraceEvent<I> {
    pub fn time(&self) -> SimTime {
        match self {
            TraceEvent::Connection { time, .. } | TraceEvent::Create { time, .. } => *time,
        }
    }
}

/// A parsed, time-ordered event trace
#[derive(Debug, Clone)]
pub struct Trace<I: PeerIdentity> {
    events: Vec<TraceEvent<I>>,
}

impl<I> Trace<I>
where
    I: PeerIdentity + FromStr<Err = IdentityError>,
{
    /// Parse trace text
    pub fn parse(text: &str) -> Result<Self, TraceError> {
        let mut events = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            events.push(parse_line(index + 1, content)?);
        }

        events.sort_by(|a, b| {
            a.time()
                .partial_cmp(&b.time())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self { events })
    }

    /// Read and parse a trace file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}

impl<I: PeerIdentity> Trace<I> {
    pub fn events(&self) -> &[TraceEvent<I>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every host named by the trace, in order of first appearance
    pub fn hosts(&self) -> Vec<I> {
        let mut seen = HashSet::new();
        let mut hosts = Vec::new();
        for event in &self.events {
            let named = match event {
                TraceEvent::Connection { a, b, .. } => [a, b],
                TraceEvent::Create { from, to, .. } => [from, to],
            };
            for host in named {
                if seen.insert(host.clone()) {
                    hosts.push(host.clone());
                }
            }
        }
        hosts
    }

    /// Time of the last event
    pub fn end_time(&self) -> SimTime {
        self.events.last().map_or(SimTime::ZERO, TraceEvent::time)
    }
}

fn parse_line<I>(line: usize, content: &str) -> Result<TraceEvent<I>, TraceError>
where
    I: PeerIdentity + FromStr<Err = IdentityError>,
{
    let fields: Vec<&str> = content.split_whitespace().collect();
    let syntax = |message: String| TraceError::Syntax { line, message };
    let host = |s: &str| s.parse::<I>().map_err(|source| TraceError::Identity { line, source });

    let time = fields
        .first()
        .and_then(|t| t.parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0)
        .ok_or_else(|| syntax(format!("invalid time in {:?}", content)))?;
    let time = SimTime::from_secs(time);

    match &fields[1..] {
        ["CONN", a, b, state] => {
            let up = match *state {
                "up" => true,
                "down" => false,
                other => return Err(syntax(format!("expected up or down, got {:?}", other))),
            };
            let (a, b) = (host(*a)?, host(*b)?);
            if a == b {
                return Err(syntax(format!("host {} connects to itself", a)));
            }
            Ok(TraceEvent::Connection { time, a, b, up })
        }
        ["C", id, from, to, size] => {
            let size = size
                .parse::<usize>()
                .map_err(|_| syntax(format!("invalid message size {:?}", size)))?;
            Ok(TraceEvent::Create {
                time,
                id: MessageId::new(*id),
                from: host(*from)?,
                to: host(*to)?,
                size,
            })
        }
        [kind, ..] => Err(syntax(format!("unknown event {:?}", kind))),
        [] => Err(syntax("missing event kind".to_string())),
    }
}
