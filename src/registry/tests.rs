#![cfg(test)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::{NodeClient, NodeRegistry, RosMaster, RosNodeClient, RpcError};

const SYSTEM_STATE: &str = "<?xml version='1.0'?><methodResponse><params><param><value><array><data>\
<value><int>1</int></value><value><string>current system state</string></value>\
<value><array><data>\
<value><array><data>\
<value><array><data><value><string>/chatter</string></value>\
<value><array><data><value><string>/talker</string></value></data></array></value></data></array></value>\
</data></array></value>\
<value><array><data>\
<value><array><data><value><string>/chatter</string></value>\
<value><array><data><value><string>/listener</string></value></data></array></value></data></array></value>\
</data></array></value>\
<value><array><data/></array></value>\
</data></array></value>\
</data></array></value></param></params></methodResponse>";

fn ros_reply(code: i64, message: &str, value: &str) -> String {
    format!(
        "<?xml version='1.0'?><methodResponse><params><param><value><array><data>\
         <value><int>{}</int></value><value><string>{}</string></value>{}\
         </data></array></value></param></params></methodResponse>",
        code, message, value
    )
}

/// Serves one canned reply per connection, picked by method name.
async fn spawn_server(status: u16) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let body = if request.contains("<methodName>getSystemState</methodName>") {
                    SYSTEM_STATE.to_string()
                } else if request.contains("<string>/talker</string>") {
                    let uri = format!("http://{}/", addr);
                    ros_reply(1, "node api", &format!("<value><string>{}</string></value>", uri))
                } else if request.contains("<methodName>lookupNode</methodName>") {
                    ros_reply(-1, "unknown node [/ghost]", "<value><string></string></value>")
                } else if request.contains("<methodName>getPid</methodName>") {
                    ros_reply(1, "", "<value><i4>4242</i4></value>")
                } else {
                    "<methodResponse><fault><value><struct>\
                     <member><name>faultCode</name><value><int>1</int></value></member>\
                     <member><name>faultString</name><value>unknown method</value></member>\
                     </struct></value></fault></methodResponse>"
                        .to_string()
                };
                let response = format!(
                    "HTTP/1.0 {} OK\r\nServer: BaseHTTP/0.3 Python/2.7\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/", addr)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = socket.read(&mut buf).await.expect("read request");
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw);
        if let Some(idx) = text.find("\r\n\r\n") {
            let length = text[..idx]
                .lines()
                .find_map(|line| line.strip_prefix("Content-Length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= idx + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn master(uri: &str) -> RosMaster {
    RosMaster::new(uri, "/ros_status_test", Duration::from_secs(2))
}

#[tokio::test]
async fn master_lists_nodes_from_system_state() {
    let uri = spawn_server(200).await;
    let names = master(&uri).node_names().await.expect("node names");
    assert_eq!(names, vec!["/listener".to_string(), "/talker".to_string()]);
}

#[tokio::test]
async fn lookup_then_get_pid() {
    let uri = spawn_server(200).await;
    let node_uri = master(&uri).lookup_node("/talker").await.expect("lookup");
    assert_eq!(node_uri, uri);

    let client = RosNodeClient::new("/ros_status_test", Duration::from_secs(2));
    assert_eq!(client.get_pid(&node_uri).await.expect("pid"), 4242);
}

#[tokio::test]
async fn unknown_node_is_a_status_error() {
    let uri = spawn_server(200).await;
    match master(&uri).lookup_node("/ghost").await {
        Err(RpcError::Status { code, message }) => {
            assert_eq!(code, -1);
            assert!(message.contains("/ghost"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn http_error_status_surfaces() {
    let uri = spawn_server(500).await;
    assert!(matches!(
        master(&uri).node_names().await,
        Err(RpcError::Http(500))
    ));
}

#[tokio::test]
async fn refused_connection_is_io_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = RosNodeClient::new("/ros_status_test", Duration::from_secs(2));
    let result = client.get_pid(&format!("http://{}/", addr)).await;
    assert!(matches!(result, Err(RpcError::Io(_))));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        // Accept and hold the connection without answering.
        let held = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(held);
    });

    let client = RosNodeClient::new("/ros_status_test", Duration::from_millis(200));
    let result = client.get_pid(&format!("http://{}/", addr)).await;
    assert!(matches!(result, Err(RpcError::Timeout(_))));
}
