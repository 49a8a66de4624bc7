//! Snowflake identifiers.
//!
//! Layout, from the most significant bit: 42 bits of milliseconds since the
//! epoch, 5 bits worker id, 5 bits process id, 12 bits per-process increment.
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_OFFSET: u32 = 17;
pub const WORKER_ID_LENGTH: u32 = 5;
pub const PROCESS_ID_OFFSET: u32 = 12;
pub const PROCESS_ID_LENGTH: u32 = 5;
pub const INCREMENT_LENGTH: u32 = 12;

const fn mask(length: u32) -> u64 {
    (1 << length) - 1
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("{part} {value} does not fit into {length} bits")]
pub struct SnowflakePartOutOfRangeError {
    part: &'static str,
    value: u64,
    length: u32,
}

/// A 5 bit machine identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
pub struct WorkerId(u8);

/// A 5 bit identifier of a process on one machine.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
pub struct ProcessId(u8);

impl WorkerId {
    pub fn new(id: u8) -> Result<Self, SnowflakePartOutOfRangeError> {
        check_part("Worker id", id.into(), WORKER_ID_LENGTH).map(|()| Self(id))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl ProcessId {
    pub fn new(id: u8) -> Result<Self, SnowflakePartOutOfRangeError> {
        check_part("Process id", id.into(), PROCESS_ID_LENGTH).map(|()| Self(id))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

fn check_part(part: &'static str, value: u64, length: u32) -> Result<(), SnowflakePartOutOfRangeError> {
    if value <= mask(length) {
        Ok(())
    } else {
        Err(SnowflakePartOutOfRangeError {
            part,
            value,
            length,
        })
    }
}

impl<'de> Deserialize<'de> for WorkerId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::new(u8::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ProcessId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::new(u8::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

/// Milliseconds since the epoch, in the 42 bit range.
pub fn timestamp_millis<E: Epoch>(time: UtcDateTime) -> Result<u64, SnowflakeTimestampError> {
    let millis = (time - E::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeTimestampError::TimeBeforeEpoch);
    }
    u64::try_from(millis)
        .ok()
        .filter(|&millis| millis <= mask(TIMESTAMP_LENGTH))
        .ok_or(SnowflakeTimestampError::TimestampTooLarge)
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(
        timestamp_millis: u64,
        worker_id: WorkerId,
        process_id: ProcessId,
        increment: u16,
    ) -> Self {
        let snowflake = (timestamp_millis & mask(TIMESTAMP_LENGTH)) << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | u64::from(process_id.get()) << PROCESS_ID_OFFSET
            | u64::from(increment) & mask(INCREMENT_LENGTH);

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp_millis(self) -> u64 {
        self.0 >> TIMESTAMP_OFFSET
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        #[allow(clippy::cast_possible_truncation)]
        WorkerId(((self.0 >> WORKER_ID_OFFSET) & mask(WORKER_ID_LENGTH)) as u8)
    }

    #[must_use]
    pub fn process_id(self) -> ProcessId {
        #[allow(clippy::cast_possible_truncation)]
        ProcessId(((self.0 >> PROCESS_ID_OFFSET) & mask(PROCESS_ID_LENGTH)) as u8)
    }

    #[must_use]
    pub fn increment(self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let increment = (self.0 & mask(INCREMENT_LENGTH)) as u16;
        increment
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = i64::try_from(self.timestamp_millis()).unwrap_or(i64::MAX);
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(millis)
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

/// Hands out unique snowflakes for one (worker, process) pair.
///
/// The increment wraps after 4096 ids. When it wraps within the same
/// millisecond, the timestamp is pushed forward by one millisecond so ids stay
/// unique and increasing.
#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    last_millis: u64,
    next_increment: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch: Epoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            last_millis: 0,
            next_increment: 0,
            phantom_data: PhantomData,
        }
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError> {
        let mut millis = timestamp_millis::<SnowflakeEpoch>(time)?.max(self.last_millis);

        if millis > self.last_millis {
            self.next_increment = 0;
        } else if u64::from(self.next_increment) > mask(INCREMENT_LENGTH) {
            millis += 1;
            self.next_increment = 0;
        }

        let increment = self.next_increment;
        self.next_increment += 1;
        self.last_millis = millis;

        Ok(Snowflake::from_parts(
            millis,
            self.worker_id,
            self.process_id,
            increment,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError> {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimestampError, WorkerId,
        timestamp_millis,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-01-01 00:00);
    }

    #[test]
    fn part_ranges() {
        for legal in [0, 0xD, 0x1F] {
            assert!(WorkerId::new(legal).is_ok());
            assert!(ProcessId::new(legal).is_ok());
        }
        for illegal in [0x20, 0xF0, u8::MAX] {
            assert!(WorkerId::new(illegal).is_err());
            assert!(ProcessId::new(illegal).is_err());
        }
    }

    #[test]
    fn timestamps_relative_to_epoch() {
        assert_eq!(
            timestamp_millis::<MillennialEpoch>(MillennialEpoch::EPOCH_TIME),
            Ok(0)
        );
        assert_eq!(
            timestamp_millis::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(1500)
            ),
            Ok(1500)
        );
        assert_eq!(
            timestamp_millis::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)
            ),
            Err(SnowflakeTimestampError::TimeBeforeEpoch)
        );
        assert_eq!(
            timestamp_millis::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000)
            ),
            Err(SnowflakeTimestampError::TimestampTooLarge)
        );
    }

    #[test]
    fn from_parts_round_trips_each_part() {
        let worker_id = WorkerId::new(0b10101).unwrap();
        let process_id = ProcessId::new(0b10001).unwrap();
        let snowflake = Snowflake::<MillennialEpoch>::from_parts(123_456, worker_id, process_id, 100);

        assert_eq!(snowflake.timestamp_millis(), 123_456);
        assert_eq!(snowflake.worker_id(), worker_id);
        assert_eq!(snowflake.process_id(), process_id);
        assert_eq!(snowflake.increment(), 100);
        assert_eq!(
            snowflake.created_at(),
            MillennialEpoch::EPOCH_TIME + Duration::milliseconds(123_456)
        );
    }

    #[test]
    fn generator_yields_unique_increasing_ids() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(
            WorkerId::new(10).unwrap(),
            ProcessId::new(0).unwrap(),
        );
        let time = utc_datetime!(2025-10-24 10:55);

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();
        assert_eq!(first.increment(), 0);
        assert_eq!(second.increment(), 1);
        assert!(second > first);

        let mut previous = second;
        for _ in 0..5000 {
            let next = generator.generate_at(time).unwrap();
            assert!(next > previous);
            previous = next;
        }
        assert!(previous.timestamp_millis() > first.timestamp_millis());
    }

    #[test]
    fn generator_restarts_increment_on_new_millisecond() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(
            WorkerId::new(1).unwrap(),
            ProcessId::new(1).unwrap(),
        );
        let time = utc_datetime!(2025-10-24 10:55);

        generator.generate_at(time).unwrap();
        generator.generate_at(time).unwrap();
        let later = generator
            .generate_at(time + Duration::milliseconds(3))
            .unwrap();
        assert_eq!(later.increment(), 0);
    }
}
