use gummy_core::orchestrator::PROFILES;

use crate::terminal::{print, table};

pub fn profiles() {
    print::header("scan profiles");
    print::block(&table::profiles(PROFILES).to_string());
}
