//! Single-byte opcode tables, one tagged enum per device service.
//!
//! Opcode values are private to a (service, direction) pair: `0x01` means
//! "open" to the lid actuator and "flush" to the flush actuator. There is no
//! shared opcode space.

use std::fmt;

use crate::error::LinkError;

macro_rules! define_opcodes {
    (
        $(#[doc = $doc:expr])*
        $name:ident {
            $( $(#[doc = $vdoc:expr])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[doc = $vdoc])* $variant = $value ),+
        }

        impl $name {
            /// The wire byte for this command.
            #[must_use]
            pub fn byte(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = LinkError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    other => Err(LinkError::UnknownOpcode(other)),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(cmd: $name) -> Self {
                cmd.byte()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}({:#04x})", self, self.byte())
            }
        }
    };
}

define_opcodes!(
    /// Commands accepted by the lid actuator.
    LidCommand {
        /// Open the lid.
        Open = 0x01,
        /// Close the lid; completion is notified on the response attribute.
        Close = 0x02,
    }
);

define_opcodes!(
    /// Commands accepted by the paper-usage sensor.
    PaperCommand {
        /// Reset the roll counter and start observing.
        Start = 0x01,
        /// Stop observing; the roll count is notified on the response attribute.
        Stop = 0x02,
    }
);

define_opcodes!(
    /// Commands accepted by the flush actuator.
    FlushCommand {
        /// Run one flush cycle.
        Flush = 0x01,
    }
);

define_opcodes!(
    /// Commands accepted by the deodorizer.
    DeodorizerCommand {
        /// Run one spray cycle.
        Spray = 0x01,
    }
);

define_opcodes!(
    /// Commands accepted by the hub from the companion application.
    HubCommand {
        /// Receive Wi-Fi credentials over the stream and associate.
        ConnectWifi = 0x01,
        /// Stream the hub status as JSON.
        RequestInfo = 0x02,
        /// Drop the Wi-Fi association.
        DisconnectWifi = 0x03,
        /// Receive a push-subscription token over the stream.
        SetSubscription = 0x04,
        /// Rediscover and reconnect downstream peripherals.
        Rescan = 0x05,
    }
);

/// Notification sent by the lid actuator once a close has completed.
pub const LID_CLOSE_COMPLETE: u8 = 0x01;
