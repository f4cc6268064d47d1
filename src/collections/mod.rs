//! Persistent value types. No operation mutates its input; updates return new roots that share
//! unaffected substructure.

pub mod array;
pub mod dict;
pub mod list;

pub use array::Array;
pub use dict::Dict;
pub use list::List;
