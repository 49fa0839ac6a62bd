//! Ports - 抽象化レイヤー
//!
//! 時刻・乱数・待機・ID 生成を trait として切り出し、
//! テストで決定的な実装（固定時刻、固定シード、待たない sleeper、連番 ID）に
//! 差し替えられるようにします。

pub mod clock;
pub mod id_generator;
pub mod random;
pub mod sleeper;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator, UlidGenerator};
pub use self::random::{RandomSource, SeededRandom, ThreadRandom};
pub use self::sleeper::{InstantSleeper, Sleeper, TokioSleeper};
