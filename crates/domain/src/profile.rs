//! Service profiles — the fixed identities and attribute layout of every node.
//!
//! Names and UUIDs are shared out of band between the hub build and each
//! peripheral build; there is no version negotiation.
//!
//! | Node | Advertised name | Response | Stream |
//! |------|-----------------|----------|--------|
//! | Lid actuator | `BT-lid-controller` | yes | no |
//! | Paper sensor | `BT-paper-observer` | yes | no |
//! | Flush actuator | `BT-auto-flusher` | no | no |
//! | Deodorizer | `BT-deodorant` | no | no |
//! | Hub | `BT-hub` | yes | yes |

use uuid::Uuid;

/// Identity and attribute layout of one peripheral-role service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceProfile {
    /// Advertised local name; the hub binds devices by exact match on it.
    pub name: &'static str,
    /// Primary service UUID.
    pub service: Uuid,
    /// Writable control attribute carrying single-byte opcodes.
    pub control: Uuid,
    /// Notify-only response attribute, for devices that answer commands.
    pub response: Option<Uuid>,
    /// Write + notify attribute carrying fragmented stream messages.
    pub stream: Option<Uuid>,
}

impl ServiceProfile {
    /// Every attribute exposed by this profile, control first.
    pub fn attributes(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.control)
            .chain(self.response)
            .chain(self.stream)
    }

    /// Attributes the central may write to.
    pub fn writable(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.control).chain(self.stream)
    }

    /// Attributes the peripheral may notify on.
    pub fn notifiable(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.response.into_iter().chain(self.stream)
    }

    /// Whether `attribute` belongs to this profile.
    #[must_use]
    pub fn has_attribute(&self, attribute: Uuid) -> bool {
        self.attributes().any(|a| a == attribute)
    }
}

/// Lid actuator: open/close, notifies close completion.
pub const LID_CONTROLLER: ServiceProfile = ServiceProfile {
    name: "BT-lid-controller",
    service: Uuid::from_u128(0xac6d_d643_a32e_42fb_836d_8130_790d_9ab4),
    control: Uuid::from_u128(0x7477_9bc7_1e28_4cb1_8dd7_3a3f_2a92_59ab),
    response: Some(Uuid::from_u128(0x82bd_b1a9_4ffd_4a97_8b5f_af7e_8465_5133)),
    stream: None,
};

/// Paper-usage sensor: start/stop observing, notifies the roll count.
pub const PAPER_OBSERVER: ServiceProfile = ServiceProfile {
    name: "BT-paper-observer",
    service: Uuid::from_u128(0x0698_d1ab_9144_496a_9878_9f60_27e1_7ef9),
    control: Uuid::from_u128(0xdcdb_d8b8_0ad3_45b2_867a_1e44_9fd1_4646),
    response: Some(Uuid::from_u128(0x49fb_080c_8d01_4996_b318_2718_6d78_430a)),
    stream: None,
};

/// Flush actuator: control only.
pub const AUTO_FLUSHER: ServiceProfile = ServiceProfile {
    name: "BT-auto-flusher",
    service: Uuid::from_u128(0x6408_f4f4_5002_4787_8c6f_c441_47b0_6802),
    control: Uuid::from_u128(0xf36a_79b8_f196_4975_8e53_15ed_99ef_a275),
    response: None,
    stream: None,
};

/// Deodorizer: control only.
pub const DEODORIZER: ServiceProfile = ServiceProfile {
    name: "BT-deodorant",
    service: Uuid::from_u128(0xcb17_86f9_3211_410a_941b_269e_e08c_47ad),
    control: Uuid::from_u128(0xa13e_8dd4_0046_4c9b_b320_b0fb_a7a2_f651),
    response: None,
    stream: None,
};

/// The hub itself, controlled by the companion application.
pub const HUB: ServiceProfile = ServiceProfile {
    name: "BT-hub",
    service: Uuid::from_u128(0x9e3f_1c52_7a4d_4b0e_8c61_2f5d_8a9b_3c70),
    control: Uuid::from_u128(0x9e3f_1c52_7a4d_4b0e_8c61_2f5d_8a9b_3c71),
    response: Some(Uuid::from_u128(0x9e3f_1c52_7a4d_4b0e_8c61_2f5d_8a9b_3c72)),
    stream: Some(Uuid::from_u128(0x9e3f_1c52_7a4d_4b0e_8c61_2f5d_8a9b_3c73)),
};

/// The four downstream peripherals, in the order the hub connects them.
pub const DOWNSTREAM: [ServiceProfile; 4] =
    [LID_CONTROLLER, PAPER_OBSERVER, AUTO_FLUSHER, DEODORIZER];
