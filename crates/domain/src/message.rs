//! Traits for routing messages by kind.

use std::fmt;
use std::hash::Hash;

/// A closed set of messages the bus can route.
///
/// Implemented by the `Command` and `Event` enums. Every variant has a
/// `Kind` discriminant that handler tables are keyed on.
pub trait Message: fmt::Debug + Send + Sync + 'static {
    /// Discriminant of the variants of this message set.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the kind of this message.
    fn kind(&self) -> Self::Kind;

    /// Returns every kind of this message set, in declaration order.
    fn kinds() -> &'static [Self::Kind];
}

/// A payload type carried by exactly one variant of a message set.
pub trait Variant<M: Message>: Into<M> + Send + 'static {
    /// Returns the kind of the variant carrying this payload.
    fn kind() -> M::Kind;

    /// Unwraps the payload, handing the message back if it is another variant.
    fn extract(message: M) -> Result<Self, M>;
}

/// Declares a message enum whose variants each wrap a payload type of the
/// same name, together with its kind enum and the `Message`/`Variant` impls.
///
/// ```
/// use domain::{Message, Variant};
///
/// #[derive(Debug, Clone)]
/// pub struct Ping;
///
/// #[derive(Debug, Clone)]
/// pub struct Pong;
///
/// domain::messages! {
///     #[derive(Debug, Clone)]
///     pub enum Signal / SignalKind { Ping, Pong }
/// }
///
/// let signal: Signal = Ping.into();
/// assert_eq!(signal.kind(), SignalKind::Ping);
/// assert!(Pong::extract(signal).is_err());
/// ```
#[macro_export]
macro_rules! messages {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident / $kind:ident { $($variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($variant),)+
        }

        /// Kind of each message variant.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $kind {
            $($variant,)+
        }

        impl $crate::Message for $name {
            type Kind = $kind;

            fn kind(&self) -> $kind {
                match self {
                    $($name::$variant(_) => $kind::$variant,)+
                }
            }

            fn kinds() -> &'static [$kind] {
                &[$($kind::$variant,)+]
            }
        }

        $(
            impl From<$variant> for $name {
                fn from(message: $variant) -> Self {
                    $name::$variant(message)
                }
            }

            impl $crate::Variant<$name> for $variant {
                fn kind() -> $kind {
                    $kind::$variant
                }

                fn extract(message: $name) -> Result<Self, $name> {
                    match message {
                        $name::$variant(inner) => Ok(inner),
                        #[allow(unreachable_patterns)]
                        other => Err(other),
                    }
                }
            }
        )+
    };
}
