use crate::{Error, Result, id::base36};
use core::time::Duration;
use ferroid::{
    define_snowflake_id,
    generator::{IdGenStatus, LockSnowflakeGenerator},
    time::{MonotonicClock, TimeSource},
};

/// Default epoch: Wednesday, January 1, 2025 00:00:00 UTC
pub const USERNODE_EPOCH: Duration = Duration::from_millis(1_735_689_600_000);

pub const AREA_BITS: u64 = 5;
pub const NODE_BITS: u64 = 7;

const AREA_MASK: u64 = (1 << AREA_BITS) - 1;
const NODE_MASK: u64 = (1 << NODE_BITS) - 1;

define_snowflake_id!(
    /// A user identifier.
    ///
    /// - 1 bit reserved
    /// - 41 bits timestamp (ms since [`USERNODE_EPOCH`])
    /// - 12 bits machine ID (`area << 7 | node`)
    /// - 10 bits sequence
    ///
    /// ```text
    ///  Bit Index:  63           63 62            22 21             10 9             0
    ///              +--------------+----------------+-----------------+---------------+
    ///  Field:      | reserved (1) | timestamp (41) | machine ID (12) | sequence (10) |
    ///              +--------------+----------------+-----------------+---------------+
    ///              |<----------- MSB ---------- 64 bits ----------- LSB ------------>|
    /// ```
    ///
    /// The reserved bit keeps every ID representable as a positive `i64`.
    UserId, u64,
    reserved: 1,
    timestamp: 41,
    machine_id: 12,
    sequence: 10
);

const _: () = assert!(AREA_BITS + NODE_BITS == 12);

impl UserId {
    pub fn area(&self) -> u64 {
        (self.machine_id() >> NODE_BITS) & AREA_MASK
    }

    pub fn node(&self) -> u64 {
        self.machine_id() & NODE_MASK
    }

    /// Lowercase base-36 rendering used as the stored user ID.
    pub fn to_base36(&self) -> String {
        base36::encode(self.to_raw())
    }

    pub fn from_base36(s: &str) -> Option<Self> {
        base36::decode(s).map(Self::from_raw)
    }
}

/// The `(area, node)` pair that namespaces every ID minted by one process.
///
/// Two processes configured with the same pair can mint colliding IDs. Keeping
/// pairs distinct across a deployment is the operator's responsibility; this
/// type only guarantees that both codes fit the layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdNode {
    area: u64,
    node: u64,
}

impl IdNode {
    /// Returns `None` if either code exceeds its field width.
    pub const fn new(area: u64, node: u64) -> Option<Self> {
        if area > AREA_MASK || node > NODE_MASK {
            return None;
        }
        Some(Self { area, node })
    }

    pub const fn area(&self) -> u64 {
        self.area
    }

    pub const fn node(&self) -> u64 {
        self.node
    }

    pub const fn max_area() -> u64 {
        AREA_MASK
    }

    pub const fn max_node() -> u64 {
        NODE_MASK
    }

    /// The machine-ID field both codes pack into.
    pub const fn machine_id(&self) -> u64 {
        (self.area << NODE_BITS) | self.node
    }
}

/// The generator shared by every request task.
pub type UserIdGenerator<T = MonotonicClock> = LockSnowflakeGenerator<UserId, T>;

/// Builds a generator for `node`, timed by a monotonic clock anchored at
/// [`USERNODE_EPOCH`].
///
/// # Example
/// ```
/// use usernode::{IdNode, next_user_id, user_id_generator};
///
/// let generator = user_id_generator(IdNode::new(1, 7).unwrap());
/// let a = next_user_id(&generator).unwrap();
/// let b = next_user_id(&generator).unwrap();
/// assert!(a < b);
/// assert_eq!((a.area(), a.node()), (1, 7));
/// ```
pub fn user_id_generator(node: IdNode) -> UserIdGenerator {
    UserIdGenerator::new(node.machine_id(), MonotonicClock::with_epoch(USERNODE_EPOCH))
}

/// Takes the next ID from `generator`, yielding the thread while the
/// current millisecond's sequence is exhausted.
pub fn next_user_id<T>(generator: &UserIdGenerator<T>) -> Result<UserId>
where
    T: TimeSource<u64>,
{
    loop {
        match generator.try_next_id().map_err(Error::internal)? {
            IdGenStatus::Ready { id } => break Ok(id),
            IdGenStatus::Pending { .. } => std::thread::yield_now(),
        }
    }
}
