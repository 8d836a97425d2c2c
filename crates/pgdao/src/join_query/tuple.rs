//! Compile-time shape of a join: the tuple of record types it yields.

use crate::record::Record;
use crate::value::RowMap;

/// A tuple of records hydrated from per-table row buckets.
pub trait RecordTuple: Sized + Send + 'static {
    /// Number of joined tables.
    const ARITY: usize;

    /// Build each record from its bucket; missing buckets hydrate defaults.
    fn hydrate(buckets: Vec<RowMap>) -> Self;
}

/// Grow a record tuple by one joined table.
pub trait Append<Next: Record>: RecordTuple {
    type Output: RecordTuple;
}

macro_rules! impl_record_tuple {
    ($arity:literal => $($name:ident),+) => {
        impl<$($name: Record),+> RecordTuple for ($($name,)+) {
            const ARITY: usize = $arity;

            fn hydrate(buckets: Vec<RowMap>) -> Self {
                let mut buckets = buckets.into_iter();
                ($($name::from_row(&buckets.next().unwrap_or_default()),)+)
            }
        }
    };
}

impl_record_tuple!(1 => A);
impl_record_tuple!(2 => A, B);
impl_record_tuple!(3 => A, B, C);
impl_record_tuple!(4 => A, B, C, D);
impl_record_tuple!(5 => A, B, C, D, E);
impl_record_tuple!(6 => A, B, C, D, E, F);

macro_rules! impl_append {
    ($($name:ident),+) => {
        impl<$($name: Record,)+ Next: Record> Append<Next> for ($($name,)+) {
            type Output = ($($name,)+ Next);
        }
    };
}

impl_append!(A);
impl_append!(A, B);
impl_append!(A, B, C);
impl_append!(A, B, C, D);
impl_append!(A, B, C, D, E);
