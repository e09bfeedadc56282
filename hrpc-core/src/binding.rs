//! # Binding Pipeline
//!
//! This module turns a [`crate::declaration::MethodDeclaration`] and the live arguments of a call
//! into the pieces of an HTTP request.
//!
//! It is split in two phases with very different lifetimes:
//!
//! 1. **Build once** ([`descriptor`]): the parameters of a method are classified by the
//!    [`binder::BinderChain`] into an immutable [`MethodDescriptor`]. The descriptor is shared
//!    by every call to the method and is never mutated.
//! 2. **Materialize per call** ([`materialize`]): the descriptor and the call arguments are
//!    combined into a freshly allocated [`CallBindingContext`] holding the working URL,
//!    the header values and the body payload of that single call.
pub mod binder;
pub mod descriptor;
pub mod materialize;

pub use binder::{Binding, BinderChain, ParameterBinder, SlotKey};
pub use descriptor::{DescriptorBuilder, DescriptorError, HostBinding, MethodDescriptor, ReturnShape};
pub use materialize::{BindError, CallBindingContext};
