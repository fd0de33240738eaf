// ABOUTME: Shared fixtures for integration tests.
// ABOUTME: Canned kubectl/docker output and manifest helpers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use dockyard::config::EngineConfig;
use dockyard::engine::Engine;
use dockyard::exec::ScriptedRunner;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("dockyard=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub const DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
---
apiVersion: v1
kind: Service
metadata:
  name: web
";

#[allow(dead_code)]
pub const APPLY_OUTPUT: &str = "\
deployment.apps/web created
service/web configured
";

#[allow(dead_code)]
pub const PODS_ALL_READY: &str = "\
NAME                   READY   STATUS    RESTARTS   AGE   IP           NODE
web-7d9f8c6b5-abcde    1/1     Running   0          40s   10.1.0.12    node-a
web-7d9f8c6b5-fghij    1/1     Running   0          40s   10.1.0.13    node-b
";

#[allow(dead_code)]
pub const PODS_HALF_READY: &str = "\
NAME                   READY   STATUS             RESTARTS      AGE   IP           NODE
web-7d9f8c6b5-abcde    1/1     Running            0             40s   10.1.0.12    node-a
web-7d9f8c6b5-fghij    0/1     ImagePullBackOff   3 (12s ago)   40s   10.1.0.13    node-b
";

#[allow(dead_code)]
pub const EVENTS: &str = "\
LAST SEEN   TYPE      REASON      OBJECT                        MESSAGE
41s         Normal    Scheduled   pod/web-7d9f8c6b5-fghij       Successfully assigned default/web-7d9f8c6b5-fghij to node-b
38s         Normal    Pulling     pod/web-7d9f8c6b5-fghij       Pulling image \"ghcr.io/acme/web:v2\"
35s         Warning   Failed      pod/web-7d9f8c6b5-fghij       Failed to pull image \"ghcr.io/acme/web:v2\": not found
35s         Warning   BackOff     pod/web-7d9f8c6b5-fghij       Back-off pulling image \"ghcr.io/acme/web:v2\"
";

#[allow(dead_code)]
pub const DESCRIBE: &str = "\
Name:             web-7d9f8c6b5-fghij
Namespace:        default
Node:             node-b/10.0.0.2
Status:           Pending
IP:               10.1.0.13
Containers:
  web:
    Container ID:
    Image:          ghcr.io/acme/web:v2
    Port:           8080/TCP
    State:          Waiting
      Reason:       ImagePullBackOff
    Ready:          False
    Restart Count:  0
    Environment:    <none>
Conditions:
  Type              Status
  Initialized       True
  Ready             False
Volumes:
  kube-api-access-x2x9p:
    Type:                    Projected
QoS Class:                   BestEffort
Events:
  Type     Reason     Age   From               Message
  ----     ------     ----  ----               -------
  Normal   Scheduled  41s   default-scheduler  Successfully assigned default/web-7d9f8c6b5-fghij to node-b
  Warning  Failed     35s   kubelet            Failed to pull image \"ghcr.io/acme/web:v2\"
";

/// Write `content` as `name` inside `dir`.
#[allow(dead_code)]
pub fn write_manifest(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// An engine over `runner`, keeping the runner for call assertions.
#[allow(dead_code)]
pub fn engine(runner: ScriptedRunner) -> (Engine, Arc<ScriptedRunner>) {
    let runner = Arc::new(runner);
    let engine = Engine::new(EngineConfig::default(), runner.clone());
    (engine, runner)
}
