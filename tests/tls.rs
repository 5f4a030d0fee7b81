mod util;

use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConnection, ServerConnection};

/// Drives both ends of an in-memory connection until the handshake
/// finishes or one side fails.
fn handshake(
    client: &mut ClientConnection,
    server: &mut ServerConnection,
) -> Result<(), rustls::Error> {
    let mut buf = Vec::new();
    for _ in 0..16 {
        buf.clear();
        while client.wants_write() {
            client.write_tls(&mut buf).unwrap();
        }
        let mut rd = &buf[..];
        while !rd.is_empty() {
            server.read_tls(&mut rd).unwrap();
            server.process_new_packets()?;
        }

        buf.clear();
        while server.wants_write() {
            server.write_tls(&mut buf).unwrap();
        }
        let mut rd = &buf[..];
        while !rd.is_empty() {
            client.read_tls(&mut rd).unwrap();
            client.process_new_packets()?;
        }

        if !client.is_handshaking() && !server.is_handshaking() {
            return Ok(());
        }
    }
    panic!("handshake did not complete");
}

fn connect(
    manager: &vaultpki::PkiManager,
    cert_id: &str,
    server_name: &'static str,
) -> Result<ClientConnection, rustls::Error> {
    let server_config = manager.tls_config(cert_id).unwrap().server_config().unwrap();
    let client_cert = util::issue_server_cert(manager, &format!("{cert_id}-client"), "client");
    let client_config = vaultpki::TlsConfig::from_certificate(&client_cert)
        .unwrap()
        .client_config(manager.root_store().unwrap())
        .unwrap();

    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
    let mut client = ClientConnection::new(
        Arc::new(client_config),
        ServerName::try_from(server_name).unwrap(),
    )
    .unwrap();
    handshake(&mut client, &mut server)?;
    Ok(client)
}

#[test]
fn handshake_with_issued_certificate() {
    let (_dir, manager) = util::manager();
    util::issue_server_cert(&manager, "srv-1", "test-server.local");

    let client = connect(&manager, "srv-1", "test-server.local").unwrap();
    assert_eq!(
        client.protocol_version(),
        Some(rustls::ProtocolVersion::TLSv1_3)
    );
}

#[test]
fn handshake_by_ip_address() {
    let (_dir, manager) = util::manager();
    util::issue_server_cert(&manager, "srv-1", "test-server.local");

    connect(&manager, "srv-1", "127.0.0.1").unwrap();
}

#[test]
fn handshake_rejects_wrong_name() {
    let (_dir, manager) = util::manager();
    util::issue_server_cert(&manager, "srv-1", "test-server.local");

    assert!(connect(&manager, "srv-1", "elsewhere.local").is_err());
}

#[test]
fn handshake_rejects_foreign_root() {
    let (_dir, manager) = util::manager();
    let (_other_dir, other) = util::manager();
    util::issue_server_cert(&manager, "srv-1", "test-server.local");

    let server_config = manager.tls_config("srv-1").unwrap().server_config().unwrap();
    let client_config = util::issue_server_cert(&other, "client", "client");
    let client_config = vaultpki::TlsConfig::from_certificate(&client_config)
        .unwrap()
        .client_config(other.root_store().unwrap())
        .unwrap();

    let mut server = ServerConnection::new(Arc::new(server_config)).unwrap();
    let mut client = ClientConnection::new(
        Arc::new(client_config),
        ServerName::try_from("test-server.local").unwrap(),
    )
    .unwrap();
    assert!(handshake(&mut client, &mut server).is_err());
}
