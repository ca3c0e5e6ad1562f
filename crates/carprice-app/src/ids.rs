// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

/// Generation counter attached to an outgoing request. A widget only accepts
/// the answer carrying the token it is waiting for.
macro_rules! request_token {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(generation: u64) -> Self {
                Self(generation)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            pub const fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

request_token!(OptionToken, "options");
request_token!(TableToken, "table");
request_token!(SubmitToken, "submit");

#[cfg(test)]
mod tests {
    use super::{OptionToken, TableToken};

    #[test]
    fn tokens_advance_and_display_their_kind() {
        let first = OptionToken::new(0).next();
        assert_eq!(first.get(), 1);
        assert_ne!(first, first.next());
        assert_eq!(TableToken::new(7).to_string(), "table#7");
    }
}
