pub mod tally;
pub mod votes;

pub use tally::TallySnapshot;
pub use votes::{StoredVote, UpsertOutcome, UpsertVote};
