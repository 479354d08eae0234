pub mod encode;
pub mod publish;
pub mod runs;
pub mod stats;
