#![allow(dead_code)]

pub use actord_test_utils::builders::{write_config, ActorDir, ActorDirBuilder};
pub use actord_test_utils::fake_executor::{failed, ok_json, spawn_failed, FakeExecutor};
pub use actord_test_utils::{init_tracing, with_timeout};
