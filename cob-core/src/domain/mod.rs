pub mod cob;
pub mod delinquency;
pub mod investor;
pub mod ordering;
