use std::net::TcpListener;

/// Ask the OS for a free TCP port.
///
/// The port is released before it is returned, so another process could take it before the
/// endpoint binds it. In practice the window is a few milliseconds.
pub fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind(("0.0.0.0", 0))?;
    Ok(listener.local_addr()?.port())
}
