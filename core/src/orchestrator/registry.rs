use std::future::Future;
use std::pin::Pin;

use super::{Orchestrator, StageOutcome};
use crate::store::Store;

/// What a profile operates on.
pub struct Session {
    pub orchestrator: Orchestrator,
    pub store: Store,
}

impl Session {
    pub fn new(orchestrator: Orchestrator, store: Store) -> Self {
        Self { orchestrator, store }
    }
}

pub type ProfileFuture<'a> = Pin<Box<dyn Future<Output = Vec<StageOutcome>> + Send + 'a>>;
pub type ProfileFn = for<'a> fn(&'a mut Session) -> ProfileFuture<'a>;

/// A named, numbered entry point.
#[derive(Clone, Copy)]
pub struct Profile {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub run: ProfileFn,
}

impl Profile {
    /// `001_masscan` style key.
    pub fn key(&self) -> String {
        format!("{}_{}", self.id, self.name)
    }

    pub fn matches(&self, key: &str) -> bool {
        key == self.id || key == self.name || key == self.key()
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

pub static PROFILES: &[Profile] = &[
    Profile {
        id: "001",
        name: "masscan",
        description: "Manual masscan run with the current settings",
        run: masscan,
    },
    Profile {
        id: "002",
        name: "nmap",
        description: "Manual nmap run with the current settings",
        run: nmap,
    },
    Profile {
        id: "101",
        name: "complex_1",
        description: "ARP discovery and the top 1000 TCP and UDP ports of the current range",
        run: complex_1,
    },
    Profile {
        id: "102",
        name: "complex_2",
        description: "Remaining TCP ports and next 3000 UDP ports of the hosts found in stage 1",
        run: complex_2,
    },
    Profile {
        id: "103",
        name: "complex_3",
        description: "Nmap inspection of every open port found in stages 1 and 2",
        run: complex_3,
    },
    Profile {
        id: "104",
        name: "complex_4",
        description: "Remaining ports of the current range, excluding the hosts of stage 1",
        run: complex_4,
    },
    Profile {
        id: "111",
        name: "complex_1_2",
        description: "Stages 1 and 2",
        run: complex_1_2,
    },
    Profile {
        id: "112",
        name: "complex_1_3",
        description: "Stages 1 to 3",
        run: complex_1_3,
    },
    Profile {
        id: "113",
        name: "complex_1_4",
        description: "Stages 1 to 4",
        run: complex_1_4,
    },
    Profile {
        id: "201",
        name: "arp_discovery",
        description: "ARP host discovery of the current range",
        run: arp_discovery,
    },
    Profile {
        id: "202",
        name: "dns_discovery",
        description: "Reverse DNS list scan of the current range",
        run: dns_discovery,
    },
];

/// Looks a profile up by id, name or `id_name`.
pub fn find_profile(key: &str) -> Option<&'static Profile> {
    PROFILES.iter().find(|profile| profile.matches(key))
}

fn masscan(session: &mut Session) -> ProfileFuture<'_> {
    Box::pin(async move {
        let Session { orchestrator, store } = session;
        vec![orchestrator.manual_masscan(store).await]
    })
}

fn nmap(session: &mut Session) -> ProfileFuture<'_> {
    Box::pin(async move {
        let Session { orchestrator, store } = session;
        vec![orchestrator.manual_nmap(store).await]
    })
}

fn arp_discovery(session: &mut Session) -> ProfileFuture<'_> {
    Box::pin(async move {
        let Session { orchestrator, store } = session;
        vec![orchestrator.arp_discovery(store).await]
    })
}

fn dns_discovery(session: &mut Session) -> ProfileFuture<'_> {
    Box::pin(async move {
        let Session { orchestrator, store } = session;
        vec![orchestrator.dns_discovery(store).await]
    })
}

macro_rules! staged_profile {
    ($name:ident, $stages:expr) => {
        fn $name(session: &mut Session) -> ProfileFuture<'_> {
            Box::pin(async move {
                let Session { orchestrator, store } = session;
                orchestrator.run_stages($stages, store).await
            })
        }
    };
}

staged_profile!(complex_1, 1..=1);
staged_profile!(complex_2, 2..=2);
staged_profile!(complex_3, 3..=3);
staged_profile!(complex_4, 4..=4);
staged_profile!(complex_1_2, 1..=2);
staged_profile!(complex_1_3, 1..=3);
staged_profile!(complex_1_4, 1..=4);

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
