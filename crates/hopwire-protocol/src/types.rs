//! Core protocol types: destinations, type codes, and payload kinds.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use hopwire_transport::ChannelId;

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// The set of roles an envelope is meant for.
///
/// This is NOT an address. `Destination::SERVER` means "whoever is
/// acting as server", and `Destination::CLIENTS` means "every process
/// acting as client". Combine them with `|`:
///
/// ```rust
/// use hopwire_protocol::Destination;
///
/// let everyone = Destination::CLIENTS | Destination::SERVER;
/// assert_eq!(everyone, Destination::ALL);
/// assert!(everyone.contains(Destination::SERVER));
/// ```
///
/// An empty destination is legal but inert: nothing runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Destination(u8);

impl Destination {
    /// Deliver nowhere.
    pub const NONE: Destination = Destination(0);
    /// Every process acting as client.
    pub const CLIENTS: Destination = Destination(0b01);
    /// The process acting as server.
    pub const SERVER: Destination = Destination(0b10);
    /// Clients and server.
    pub const ALL: Destination = Destination(0b11);

    const MASK: u8 = 0b11;

    /// Returns the raw bitmask (bit0 = Clients, bit1 = Server).
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds a destination from a raw bitmask.
    ///
    /// Returns `None` if any of bits 2-7 are set.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::MASK == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Returns `true` if every role in `other` is also in `self`.
    pub const fn contains(self, other: Destination) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no role is targeted.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Adds the roles in `other`.
    pub fn insert(&mut self, other: Destination) {
        self.0 |= other.0;
    }

    /// Removes the roles in `other`.
    pub fn remove(&mut self, other: Destination) {
        self.0 &= !other.0;
    }

    /// Returns a copy without the roles in `other`.
    #[must_use]
    pub const fn without(self, other: Destination) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for Destination {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Destination {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => write!(f, "None"),
            Self::CLIENTS => write!(f, "Clients"),
            Self::SERVER => write!(f, "Server"),
            _ => write!(f, "Clients|Server"),
        }
    }
}

// ---------------------------------------------------------------------------
// TypeCode
// ---------------------------------------------------------------------------

/// Identifies a registered payload type on the wire.
///
/// The code is a CRC-32 over the defining crate's name and the type's
/// fully qualified name, reinterpreted as `i32`. It is stable for the
/// life of a build, but renaming or moving a type changes it, so two
/// peers must run the same set of payload types to understand each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeCode(pub i32);

impl TypeCode {
    /// Computes the code for `T` from its fully qualified type name.
    ///
    /// The first path segment of the name is the defining crate, which
    /// acts as the module identity.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let name = std::any::type_name::<T>();
        let module = name.split("::").next().unwrap_or(name);
        Self::from_names(module, name)
    }

    /// Computes the code from an explicit module identity and type name.
    pub fn from_names(module: &str, type_name: &str) -> Self {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(module.as_bytes());
        hasher.update(b"/");
        hasher.update(type_name.as_bytes());
        Self(hasher.finalize() as i32)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{:08x}", self.0 as u32)
    }
}

// ---------------------------------------------------------------------------
// PayloadKind / ChannelIds
// ---------------------------------------------------------------------------

/// The four envelope kinds. Each travels on its own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// Header only, fire-and-forget.
    Command,
    /// Header plus serialized body, one way.
    Message,
    /// Header plus serialized request body.
    Request,
    /// Header plus serialized reply body, sent back one hop.
    Reply,
}

impl PayloadKind {
    /// All kinds, in channel-table order.
    pub const ALL: [PayloadKind; 4] = [
        PayloadKind::Command,
        PayloadKind::Message,
        PayloadKind::Request,
        PayloadKind::Reply,
    ];
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Message => write!(f, "message"),
            Self::Request => write!(f, "request"),
            Self::Reply => write!(f, "reply"),
        }
    }
}

/// The transport channel assigned to each payload kind.
///
/// Both ends of a connection must agree on this table; the defaults are
/// what every hopwire peer uses unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelIds {
    pub command: ChannelId,
    pub message: ChannelId,
    pub request: ChannelId,
    pub reply: ChannelId,
}

impl ChannelIds {
    /// Default channel for messages.
    pub const MESSAGE: ChannelId = ChannelId(2048);
    /// Default channel for commands.
    pub const COMMAND: ChannelId = ChannelId(4096);
    /// Default channel for requests.
    pub const REQUEST: ChannelId = ChannelId(6144);
    /// Default channel for replies.
    pub const REPLY: ChannelId = ChannelId(8192);

    /// Returns the channel for `kind`.
    pub fn channel(&self, kind: PayloadKind) -> ChannelId {
        match kind {
            PayloadKind::Command => self.command,
            PayloadKind::Message => self.message,
            PayloadKind::Request => self.request,
            PayloadKind::Reply => self.reply,
        }
    }

    /// Maps an inbound channel back to its payload kind.
    pub fn kind_of(&self, channel: ChannelId) -> Option<PayloadKind> {
        PayloadKind::ALL
            .into_iter()
            .find(|kind| self.channel(*kind) == channel)
    }

    /// Returns `true` if all four channels differ.
    pub fn are_distinct(&self) -> bool {
        let all = PayloadKind::ALL.map(|kind| self.channel(kind));
        all.iter()
            .enumerate()
            .all(|(i, a)| all[i + 1..].iter().all(|b| a != b))
    }
}

impl Default for ChannelIds {
    fn default() -> Self {
        Self {
            command: Self::COMMAND,
            message: Self::MESSAGE,
            request: Self::REQUEST,
            reply: Self::REPLY,
        }
    }
}
