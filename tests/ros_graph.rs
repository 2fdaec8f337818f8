use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ros_status_lib::{ReporterConfig, SamplingOptions, StatusError, StatusReporter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn reply(value: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<methodResponse><params><param><value><array><data>\
         <value><int>1</int></value><value><string></string></value>{}\
         </data></array></value></param></params></methodResponse>\n",
        value
    )
}

fn system_state(node: &str) -> String {
    reply(&format!(
        "<value><array><data>\
         <value><array><data><value><array><data>\
         <value><string>/rosout</string></value>\
         <value><array><data><value><string>{node}</string></value></data></array></value>\
         </data></array></value></data></array></value>\
         <value><array><data/></array></value>\
         <value><array><data/></array></value>\
         </data></array></value>"
    ))
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 2048];
    while !String::from_utf8_lossy(&raw).contains("</methodCall>") {
        let n = socket.read(&mut buf).await.expect("read");
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// A master that doubles as the node's slave API. The node reports the pid
/// of this test process so the real metrics provider has something to sample.
async fn spawn_graph(node: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let uri = format!("http://{}/", listener.local_addr().expect("addr"));
    let node_uri = uri.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let node_uri = node_uri.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let body = if request.contains("getSystemState") {
                    system_state(node)
                } else if request.contains("lookupNode") {
                    reply(&format!("<value><string>{}</string></value>", node_uri))
                } else {
                    reply(&format!("<value><int>{}</int></value>", std::process::id()))
                };
                let response = format!(
                    "HTTP/1.0 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    uri
}

fn options() -> SamplingOptions {
    SamplingOptions {
        sampling_window: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn full_report_against_loopback_master() {
    let master_uri = spawn_graph("/self_node").await;
    let config = ReporterConfig {
        master_uri,
        ..ReporterConfig::default()
    };
    let reporter = StatusReporter::connect(config).expect("reporter");

    assert_eq!(
        reporter.get_pid("/self_node").await.expect("pid"),
        std::process::id()
    );

    let report = reporter.full_report(options()).await.expect("report");
    assert!((0.0..=100.0).contains(&report.cpu_percent));
    assert!((0.0..=100.0).contains(&report.mem_percent));

    let sample = report.nodes.get("/self_node").expect("node sampled");
    assert!(sample.cpu_percent >= 0.0 && sample.cpu_percent <= 100.0);
    assert!(sample.mem_percent > 0.0 && sample.mem_percent <= 100.0);

    let json = serde_json::to_value(&report).expect("json");
    assert!(json["nodes"]["/self_node"]["mem_percent"].is_f64());
}

#[tokio::test]
async fn busy_node_shows_cpu_over_default_window() {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let spinner = thread::spawn(move || {
        let mut counter = 0u64;
        while !flag.load(Ordering::Relaxed) {
            counter = std::hint::black_box(counter.wrapping_add(1));
        }
    });

    let master_uri = spawn_graph("/busy_node").await;
    let config = ReporterConfig {
        master_uri,
        ..ReporterConfig::default()
    };
    let reporter = StatusReporter::connect(config).expect("reporter");
    let report = reporter.full_report(SamplingOptions::default()).await;

    stop.store(true, Ordering::Relaxed);
    let _ = spinner.join();

    let report = report.expect("report");
    assert!(report.cpu_percent > 0.0, "system cpu {}", report.cpu_percent);
    let sample = report.nodes.get("/busy_node").expect("node sampled");
    assert!(
        sample.cpu_percent > 0.0 && sample.cpu_percent <= 100.0,
        "node cpu {}",
        sample.cpu_percent
    );
}

#[tokio::test]
async fn unreachable_master_fails_report() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let config = ReporterConfig {
        master_uri: format!("http://{}/", addr),
        rpc_timeout_ms: 1_000,
        ..ReporterConfig::default()
    };
    let reporter = StatusReporter::connect(config).expect("reporter");

    assert!(matches!(
        reporter.full_report(options()).await,
        Err(StatusError::Registry(_))
    ));
    assert!(matches!(
        reporter.node_stat("/anything", options()).await,
        Err(StatusError::Lookup { .. })
    ));
}
