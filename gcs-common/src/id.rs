// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Fixed-size binary identifiers.
//!
//! IDs travel on the wire as raw bytes and in storage keys as lowercase
//! hex. Distinct types exist so a node id can never be passed where a
//! cluster id is expected, even though both are the same width. Equality,
//! ordering and hashing all derive from the raw bytes.

use std::fmt;

use crate::constants::UNIQUE_ID_SIZE;

/// Declares a `[u8; N]` newtype identifier.
macro_rules! binary_id {
    ($name:ident, $size:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $size]);

        impl $name {
            /// The fixed byte width of this ID type.
            pub const SIZE: usize = $size;

            /// The nil sentinel (all 0xFF bytes).
            pub const fn nil() -> Self {
                Self([0xFF; $size])
            }

            pub fn is_nil(&self) -> bool {
                self.0 == [0xFF; $size]
            }

            /// Wrap raw bytes, refusing any other length.
            pub fn try_from_binary(bytes: &[u8]) -> Option<Self> {
                Some(Self(bytes.try_into().ok()?))
            }

            /// Wrap raw bytes. Panics on a wrong length; request decoders
            /// validate lengths before ids reach this.
            pub fn from_binary(bytes: &[u8]) -> Self {
                Self::try_from_binary(bytes).unwrap_or_else(|| {
                    panic!(
                        "expected {} bytes for {}, got {}",
                        $size,
                        stringify!($name),
                        bytes.len()
                    )
                })
            }

            /// Parse the lowercase hex form produced by `hex()`.
            pub fn from_hex(hex_str: &str) -> Option<Self> {
                let bytes = hex::decode(hex_str).ok()?;
                Self::try_from_binary(&bytes)
            }

            pub fn from_random() -> Self {
                Self(gcs_util::random::random_id_bytes())
            }

            /// Owned copy of the raw bytes, as they appear on the wire.
            pub fn binary(&self) -> Vec<u8> {
                self.0.to_vec()
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Lowercase hex form, used as the durable storage key.
            pub fn hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.hex())
            }
        }
    };
}

binary_id!(UniqueID, UNIQUE_ID_SIZE);
binary_id!(NodeID, UNIQUE_ID_SIZE);
binary_id!(ClusterID, UNIQUE_ID_SIZE);
