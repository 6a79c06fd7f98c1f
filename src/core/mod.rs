// Client core: completion polling, streaming delivery, pagination, and errors.
pub mod cursor;
pub mod error;
pub mod info;
pub mod poll;
pub mod stream;
