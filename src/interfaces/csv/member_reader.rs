use crate::domain::member::Member;
use crate::error::{Result, WalletError};
use std::io::Read;

/// Reads a member roster (`id, fellowship_id, name, email, phone`) from CSV.
pub struct MemberReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> MemberReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn members(self) -> impl Iterator<Item = Result<Member>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(WalletError::from))
    }
}
