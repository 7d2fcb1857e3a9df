//! Feature-gated thread-safety bounds for unit closures.
//!
//! With the `parallel` feature, a closure handed to
//! [`for_each_unit`](crate::for_each_unit) runs on rayon workers and must be
//! [`Send`] + [`Sync`]. Without it, units always run on the calling thread and
//! these bounds are blanket-implemented for every type.

#[cfg(feature = "parallel")]
pub trait MaybeSend: Send {}
#[cfg(feature = "parallel")]
impl<T: Send> MaybeSend for T {}

#[cfg(feature = "parallel")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "parallel")]
impl<T: Sync> MaybeSync for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSend {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSend for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSync {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSync for T {}
