//! Client identity derived from the transport-level remote address.

// std
use std::net::{IpAddr, SocketAddr};
// self
use crate::_prelude::*;

/// Failure to derive a [`ClientIdentity`]; surfaced as an internal error, never a denial.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentityError {
	/// The remote address could not be parsed as `ip:port` or a bare IP.
	#[error("Remote address `{addr}` is malformed.")]
	Malformed {
		/// Raw remote address.
		addr: String,
	},
	/// The transport did not expose a remote address at all.
	#[error("Request carries no remote address.")]
	Missing,
}

/// Stable per-client key used by the admission controller (the client's IP address).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientIdentity(IpAddr);
impl ClientIdentity {
	/// Uses the IP address as the identity.
	pub fn from_ip(ip: IpAddr) -> Self {
		Self(ip)
	}

	/// Drops the port from a connected socket address.
	pub fn from_socket_addr(addr: SocketAddr) -> Self {
		Self(addr.ip())
	}

	/// Parses `ip:port` (IPv6 in brackets) or a bare IP address.
	pub fn from_remote_addr(addr: &str) -> Result<Self, IdentityError> {
		if let Ok(socket) = addr.parse::<SocketAddr>() {
			return Ok(Self::from_socket_addr(socket));
		}

		addr.parse::<IpAddr>()
			.map(Self)
			.map_err(|_| IdentityError::Malformed { addr: addr.to_owned() })
	}

	/// Underlying IP address.
	pub fn ip(&self) -> IpAddr {
		self.0
	}
}
impl Debug for ClientIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ClientIdentity({})", self.0)
	}
}
impl Display for ClientIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for ClientIdentity {
	type Err = IdentityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_remote_addr(s)
	}
}
