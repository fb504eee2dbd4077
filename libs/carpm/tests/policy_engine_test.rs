// Copyright (C) 2025 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod common;

#[cfg(test)]
mod policy_engine_tests {
    use crate::common::*;
    use carpm_policies::common::{AppBlockingControl, CallerIdentity, ComponentName};
    use carpm_policies::config::CarPackageConfig;
    use carpm_policies::package_info::{
        AppBlockingPackageInfo, CarAppBlockingPolicy, FLAG_SET_POLICY_WAIT_FOR_CHANGE,
    };
    use carpm_policies::package_manager::CarPackageDependencies;
    use carpm_policies::policy_engine::CarPackagePolicyEngine;
    use carpm_policies::policy_proxy::PolicyServiceRegistry;
    use drivingstatus::sensor::{DrivingStatus, LocalDrivingStatusSource};
    use std::io::Write;
    use std::sync::Arc;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    const SHUTDOWN_WAIT_DURATION: Duration = Duration::from_millis(150);

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            sleep(POLL_DURATION);
        }
        condition()
    }

    fn engine(
        config: &CarPackageConfig,
    ) -> (CarPackagePolicyEngine, Arc<FakeActivityMonitor>, Arc<LocalDrivingStatusSource>) {
        let package_db = FakePackageDatabase::new();
        package_db.install(system_package("maps", 5));
        package_db.grant_permission("com.example.admin");
        let monitor = FakeActivityMonitor::new();
        let driving = Arc::new(LocalDrivingStatusSource::new());
        let engine = CarPackagePolicyEngine::new(
            config,
            CarPackageDependencies {
                package_database: package_db,
                metadata_reader: FakeMetadataReader::new(),
                activity_monitor: monitor.clone(),
                driving_status_source: driving.clone(),
                policy_services: PolicyServiceRegistry::new(),
            },
        )
        .expect("Failed to create CarPackagePolicyEngine");
        (engine, monitor, driving)
    }

    #[test]
    fn test_engine_from_config_file() {
        let _ = env_logger::try_init();
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create config file");
        writeln!(file, "default_activity_allowlist = \"maps\"").unwrap();
        writeln!(file, "policy_service_timeout_ms = 500").unwrap();
        let config = CarPackageConfig::load(file.path()).expect("Failed to load config");

        let (engine, monitor, driving) = engine(&config);
        driving.publish(DrivingStatus::FULLY_RESTRICTED);
        engine.init();
        let snapshot = engine.policy_snapshot().unwrap();
        assert!(snapshot.driving_restricted);
        assert_eq!(snapshot.default_activity_allowlist, "maps");

        assert_eq!(engine.is_activity_allowed_while_driving("maps", "AnyActivity"), Ok(true));
        monitor.launch(top_task("games", "Snake", 3));
        assert!(wait_until(|| monitor.block_count() == 1));
    }

    #[test]
    fn test_engine_applies_policies_synchronously() {
        let _ = env_logger::try_init();
        let (engine, monitor, driving) = engine(&CarPackageConfig::default());
        driving.publish(DrivingStatus::FULLY_RESTRICTED);
        engine.init();
        engine.policy_snapshot().unwrap();
        monitor.set_top_tasks(vec![top_task("maps", "MapsMain", 1)]);

        let policy = CarAppBlockingPolicy::new(
            None,
            Some(vec![AppBlockingPackageInfo::new("maps", 0, 0, 0, None, None)]),
        );
        engine
            .set_app_blocking_policy(
                &CallerIdentity::new("com.example.admin"),
                "com.example.admin",
                Some(policy),
                FLAG_SET_POLICY_WAIT_FOR_CHANGE,
            )
            .unwrap();

        // Without SYSTEM_APP_TRUSTED or a matching signature the deny entry does not apply.
        assert_eq!(engine.is_activity_allowed_while_driving("maps", "MapsMain"), Ok(true));
        assert_eq!(monitor.block_count(), 0);
        let snapshot = engine.policy_snapshot().unwrap();
        assert!(!snapshot.client_policies["com.example.admin"].denylist()["maps"].is_matching);
        assert_eq!(engine.is_service_allowed_while_driving("maps"), Ok(true));
        assert!(engine.is_driving_restricted());
        assert!(engine.is_activity_backed_by_safe_activity(&ComponentName::new("maps", "MapsMain")));
    }

    #[test]
    fn test_engine_release_and_drop() {
        let _ = env_logger::try_init();
        let (engine, monitor, driving) = engine(&CarPackageConfig::default());
        engine.init();
        engine.policy_snapshot().unwrap();
        assert!(driving.is_subscribed());

        engine.release();
        assert!(!driving.is_subscribed());
        assert!(!monitor.has_listener());
        assert_eq!(engine.is_activity_allowed_while_driving("maps", "MapsMain"), Ok(false));

        drop(engine);
        sleep(SHUTDOWN_WAIT_DURATION);
    }
}
