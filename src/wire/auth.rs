//! Login request and response messages.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::codec;
use crate::error_handling::types::WireError;

/// Password digest used by the login message.
///
/// SHA-1 logins use the legacy version 0 layout. SHA-256 logins use version
/// 1, which adds a scheme byte after the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashScheme {
    Sha1,
    Sha256,
}

impl HashScheme {
    pub fn digest(self, password: &str) -> Vec<u8> {
        match self {
            HashScheme::Sha1 => Sha1::digest(password.as_bytes()).to_vec(),
            HashScheme::Sha256 => Sha256::digest(password.as_bytes()).to_vec(),
        }
    }

    fn version(self) -> i8 {
        match self {
            HashScheme::Sha1 => 0,
            HashScheme::Sha256 => 1,
        }
    }

    fn scheme_byte(self) -> i8 {
        match self {
            HashScheme::Sha1 => 1,
            HashScheme::Sha256 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub service: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            service: "database".to_string(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new("", "")
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("hello", "world")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationRequest {
    service: String,
    username: String,
    password_hash: Vec<u8>,
    scheme: HashScheme,
}

impl AuthenticationRequest {
    pub fn new(credentials: &Credentials, scheme: HashScheme) -> Self {
        Self {
            service: credentials.service.clone(),
            username: credentials.username.clone(),
            password_hash: scheme.digest(&credentials.password),
            scheme,
        }
    }

    pub fn serialized_size(&self) -> usize {
        let scheme_byte = match self.scheme {
            HashScheme::Sha1 => 0,
            HashScheme::Sha256 => 1,
        };
        4 + 1
            + scheme_byte
            + codec::string_size(&self.service)
            + codec::string_size(&self.username)
            + self.password_hash.len()
    }

    pub fn encode(&self) -> Bytes {
        let size = self.serialized_size();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_i32((size - 4) as i32);
        buf.put_i8(self.scheme.version());
        if self.scheme == HashScheme::Sha256 {
            buf.put_i8(self.scheme.scheme_byte());
        }
        codec::put_string(&mut buf, &self.service);
        codec::put_string(&mut buf, &self.username);
        buf.put_slice(&self.password_hash);
        buf.freeze()
    }
}

/// Server answer to a login.
///
/// Only the result code is present when the login was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationResponse {
    pub result_code: i8,
    pub host_id: i32,
    pub connection_id: i64,
    pub cluster_start_time: i64,
    pub leader_address: i32,
    pub build_string: String,
}

impl AuthenticationResponse {
    /// A successful response for runs that did not capture a real one.
    pub fn synthetic() -> Self {
        Self {
            result_code: 0,
            host_id: 0,
            connection_id: 1,
            cluster_start_time: Utc::now().timestamp_millis(),
            // 127.0.0.1
            leader_address: 2130706433,
            build_string: "?revision=".to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.result_code == 0
    }

    pub fn serialized_size(&self) -> usize {
        4 + 1 + 1 + 4 + 8 + 8 + 4 + codec::string_size(&self.build_string)
    }

    pub fn encode(&self) -> Bytes {
        let size = self.serialized_size();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_i32((size - 4) as i32);
        buf.put_i8(0);
        buf.put_i8(self.result_code);
        buf.put_i32(self.host_id);
        buf.put_i64(self.connection_id);
        buf.put_i64(self.cluster_start_time);
        buf.put_i32(self.leader_address);
        codec::put_string(&mut buf, &self.build_string);
        buf.freeze()
    }

    /// Decodes a complete frame, length prefix included.
    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        let mut buf = codec::frame_body(frame)?;
        let version = codec::get_i8(&mut buf)?;
        if version != 0 {
            return Err(WireError::UnexpectedVersion(version));
        }
        let result_code = codec::get_i8(&mut buf)?;
        if result_code != 0 {
            return Ok(Self {
                result_code,
                host_id: -1,
                connection_id: -1,
                cluster_start_time: 0,
                leader_address: 0,
                build_string: String::new(),
            });
        }
        Ok(Self {
            result_code,
            host_id: codec::get_i32(&mut buf)?,
            connection_id: codec::get_i64(&mut buf)?,
            cluster_start_time: codec::get_i64(&mut buf)?,
            leader_address: codec::get_i32(&mut buf)?,
            build_string: codec::get_string(&mut buf)?.unwrap_or_default(),
        })
    }
}
