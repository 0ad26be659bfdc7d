//! Simulated peripheral firmwares and the fleet that runs them.
//!
//! Each firmware is a [`CommandHandler`](bentech_app::server::CommandHandler)
//! served by a [`DeviceServer`] on its own [`VirtualPeripheral`], so the demo
//! fleet runs the same server loop a real peripheral build would.

mod actuators;
mod lid;
mod paper;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use bentech_app::server::{CommandHandler, DeviceServer, ServerConfig};
use bentech_domain::profile::{
    AUTO_FLUSHER, DEODORIZER, LID_CONTROLLER, PAPER_OBSERVER, ServiceProfile,
};

pub use actuators::{DeodorizerFirmware, FlusherFirmware};
pub use lid::LidFirmware;
pub use paper::PaperFirmware;

use crate::radio::{VirtualAir, VirtualPeripheral};

/// Behaviour of the simulated fleet.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Time every actuator takes to complete a command.
    pub actuation: Duration,
    /// Rolls the paper sensor counts during each visit.
    pub rolls_per_visit: u32,
    /// Server loop settings shared by the four peripherals.
    pub server: ServerConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            actuation: Duration::from_millis(200),
            rolls_per_visit: 2,
            server: ServerConfig::default(),
        }
    }
}

type Served<H> = Arc<DeviceServer<VirtualPeripheral, H>>;

/// The four downstream peripherals, each served on its own task.
///
/// Dropping the fleet powers every peripheral off.
pub struct VirtualFleet {
    lid: Served<LidFirmware>,
    paper: Served<PaperFirmware>,
    flusher: Served<FlusherFirmware>,
    deodorizer: Served<DeodorizerFirmware>,
    tasks: Vec<JoinHandle<()>>,
}

fn serve<H>(
    air: &VirtualAir,
    profile: ServiceProfile,
    handler: H,
    config: &ServerConfig,
    tasks: &mut Vec<JoinHandle<()>>,
) -> Served<H>
where
    H: CommandHandler + 'static,
{
    let server = Arc::new(DeviceServer::new(
        air.peripheral(),
        profile,
        handler,
        config.clone(),
    ));
    tasks.push(tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    }));
    server
}

/// Power on the four simulated peripherals on `air`.
#[must_use]
pub fn spawn_fleet(air: &VirtualAir, config: &FleetConfig) -> VirtualFleet {
    let mut tasks = Vec::with_capacity(4);
    let lid = serve(
        air,
        LID_CONTROLLER,
        LidFirmware::new(config.actuation),
        &config.server,
        &mut tasks,
    );
    let paper = serve(
        air,
        PAPER_OBSERVER,
        PaperFirmware::new(config.actuation, config.rolls_per_visit),
        &config.server,
        &mut tasks,
    );
    let flusher = serve(
        air,
        AUTO_FLUSHER,
        FlusherFirmware::new(config.actuation),
        &config.server,
        &mut tasks,
    );
    let deodorizer = serve(
        air,
        DEODORIZER,
        DeodorizerFirmware::new(config.actuation),
        &config.server,
        &mut tasks,
    );
    tracing::info!("virtual fleet powered on");
    VirtualFleet {
        lid,
        paper,
        flusher,
        deodorizer,
        tasks,
    }
}

impl VirtualFleet {
    #[must_use]
    pub fn lid(&self) -> &LidFirmware {
        self.lid.handler()
    }

    #[must_use]
    pub fn paper(&self) -> &PaperFirmware {
        self.paper.handler()
    }

    #[must_use]
    pub fn flusher(&self) -> &FlusherFirmware {
        self.flusher.handler()
    }

    #[must_use]
    pub fn deodorizer(&self) -> &DeodorizerFirmware {
        self.deodorizer.handler()
    }
}

impl Drop for VirtualFleet {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
