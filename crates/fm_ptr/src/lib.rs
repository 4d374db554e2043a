#![doc = include_str!("../README.md")]
#![expect(unsafe_code, reason = "Raw pointers are inherently unsafe.")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

#[cfg(test)]
extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod erased;

// -----------------------------------------------------------------------------
// Top-level exports

pub use erased::{Ptr, PtrMut};
