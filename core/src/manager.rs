//! Concrete reporting-target connectors
//!
//! Subscription-manager compatible services (Customer Portal, Satellite 6, SAM)
//! are reached over their REST API. Satellite 5 speaks XML-RPC.

use crate::connector::{ConnectorError, ConnectorFactory, ConnectorResult, ReportingTargetConnector};
use crate::ini::read_section;
use crate::settings::Settings;
use crate::{ConfigModel, Error, Result, SmType};
use regex::Regex;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::{Certificate, Identity, Proxy};
use std::error::Error as StdError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_RHSM_PORT: &str = "443";
const DEFAULT_RHSM_PREFIX: &str = "/candlepin";
const DEFAULT_PROXY_PORT: &str = "3128";

/// Turn a reqwest failure into the connector taxonomy.
fn classify(err: reqwest::Error) -> ConnectorError {
    let message = describe(&err);

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return ConnectorError::Socket(io::Error::new(io_err.kind(), message));
            }
        }
        source = cause.source();
    }

    if err.is_builder() {
        ConnectorError::Backend(format!("Invalid server address: {}", message))
    } else if err.is_connect() || err.is_timeout() || err.is_request() {
        ConnectorError::Connection(message)
    } else if err.is_status() || err.is_decode() || err.is_body() || err.is_redirect() {
        ConnectorError::Backend(message)
    } else {
        ConnectorError::Unexpected(message)
    }
}

/// The error and its causes on one line.
fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn builder(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("virt-who-tui/", env!("CARGO_PKG_VERSION")))
}

/// Operator-typed addresses that do not form a URL are a backend error.
fn parse_url(url: &str) -> ConnectorResult<reqwest::Url> {
    reqwest::Url::parse(url)
        .map_err(|e| ConnectorError::Backend(format!("Invalid server address '{}': {}", url, e)))
}

fn build(builder: ClientBuilder) -> ConnectorResult<Client> {
    builder
        .build()
        .map_err(|e| ConnectorError::Backend(format!("Unable to set up HTTP client: {}", describe(&e))))
}

// ==================== Subscription Manager ====================

/// Resolved connection settings of a subscription-manager service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RhsmSettings {
    pub hostname: String,
    pub port: String,
    pub prefix: String,
    pub username: String,
    pub password: String,
    pub proxy_hostname: String,
    pub proxy_port: String,
    pub proxy_user: String,
    pub proxy_password: String,
}

impl RhsmSettings {
    /// Take the values from the model and fill blanks from the host's `rhsm.conf`.
    pub fn resolve(model: &ConfigModel, rhsm_conf: &str) -> Self {
        let server = read_section(rhsm_conf, "server");
        let host_value = |key: &str| {
            server
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        let pick = |value: &str, key: &str| {
            if value.is_empty() {
                host_value(key)
            } else {
                value.to_string()
            }
        };

        Self {
            hostname: pick(&model.rhsm_hostname, "hostname"),
            port: pick(&model.rhsm_port, "port"),
            prefix: pick(&model.rhsm_prefix, "prefix"),
            username: model.rhsm_username.clone(),
            password: model.rhsm_password.clone(),
            proxy_hostname: pick(&model.rhsm_proxy_hostname, "proxy_hostname"),
            proxy_port: pick(&model.rhsm_proxy_port, "proxy_port"),
            proxy_user: pick(&model.rhsm_proxy_user, "proxy_user"),
            proxy_password: pick(&model.rhsm_proxy_password, "proxy_password"),
        }
    }

    pub fn base_url(&self) -> String {
        let port = if self.port.is_empty() { DEFAULT_RHSM_PORT } else { &self.port };
        let prefix = self.prefix.trim_end_matches('/');
        let prefix = if prefix.is_empty() {
            DEFAULT_RHSM_PREFIX.to_string()
        } else if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{}", prefix)
        };
        format!("https://{}:{}{}", self.hostname, port, prefix)
    }

    pub fn proxy_url(&self) -> Option<String> {
        if self.proxy_hostname.is_empty() {
            return None;
        }
        let port = if self.proxy_port.is_empty() { DEFAULT_PROXY_PORT } else { &self.proxy_port };
        Some(format!("http://{}:{}", self.proxy_hostname, port))
    }
}

/// REST client for Candlepin based services.
pub struct RhsmConnector {
    settings: RhsmSettings,
    ca_dir: PathBuf,
    consumer_dir: PathBuf,
    timeout: Duration,
    client: Option<Client>,
}

impl RhsmConnector {
    pub fn new(settings: RhsmSettings, ca_dir: PathBuf, consumer_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            settings,
            ca_dir,
            consumer_dir,
            timeout,
            client: None,
        }
    }

    fn client(&self) -> ConnectorResult<Client> {
        let mut builder = builder(self.timeout);

        if let Some(url) = self.settings.proxy_url() {
            let mut proxy = Proxy::all(&url)
                .map_err(|e| ConnectorError::Backend(format!("Invalid proxy '{}': {}", url, e)))?;
            if !self.settings.proxy_user.is_empty() {
                proxy = proxy.basic_auth(&self.settings.proxy_user, &self.settings.proxy_password);
            }
            builder = builder.proxy(proxy);
        }

        for cert in load_ca_certificates(&self.ca_dir) {
            builder = builder.add_root_certificate(cert);
        }

        if let Some(identity) = load_consumer_identity(&self.consumer_dir) {
            builder = builder.identity(identity);
        }

        build(builder)
    }

    fn get(&self, path: &str) -> ConnectorResult<reqwest::blocking::Response> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ConnectorError::Unexpected("not connected".to_string()))?;
        let url = format!("{}{}", self.settings.base_url(), path);
        log::debug!("GET {}", url);

        let mut request = client.get(&url);
        if !self.settings.username.is_empty() {
            request = request.basic_auth(&self.settings.username, Some(&self.settings.password));
        }
        request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(classify)
    }
}

impl ReportingTargetConnector for RhsmConnector {
    fn connect(&mut self) -> ConnectorResult<()> {
        if self.settings.hostname.is_empty() {
            return Err(ConnectorError::Backend(
                "No subscription-manager hostname configured".to_string(),
            ));
        }
        parse_url(&self.settings.base_url())?;
        self.client = Some(self.client()?);
        self.get("/status")?;
        if !self.settings.username.is_empty() {
            let path = format!("/users/{}/owners", self.settings.username);
            self.get(&path)?;
        }
        log::info!("Connected to {}", self.settings.base_url());
        Ok(())
    }

    fn logout(&mut self) -> ConnectorResult<()> {
        self.client = None;
        Ok(())
    }

    fn owner(&mut self, consumer_uuid: &str) -> ConnectorResult<Option<String>> {
        let response = self.get(&format!("/consumers/{}/owner", consumer_uuid))?;
        let body: serde_json::Value = response.json().map_err(classify)?;
        Ok(body
            .get("key")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string))
    }
}

fn load_ca_certificates(dir: &Path) -> Vec<Certificate> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("No CA certificates from {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut certs = Vec::new();
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        if path.extension().and_then(|e| e.to_str()) != Some("pem") {
            continue;
        }
        match fs::read(&path).map(|pem| Certificate::from_pem(&pem)) {
            Ok(Ok(cert)) => certs.push(cert),
            Ok(Err(e)) => log::warn!("Skipping CA certificate {}: {}", path.display(), e),
            Err(e) => log::warn!("Skipping CA certificate {}: {}", path.display(), e),
        }
    }
    certs
}

fn load_consumer_identity(dir: &Path) -> Option<Identity> {
    let key = fs::read(dir.join("key.pem")).ok()?;
    let cert = fs::read(dir.join("cert.pem")).ok()?;
    let mut pem = key;
    pem.push(b'\n');
    pem.extend_from_slice(&cert);
    match Identity::from_pem(&pem) {
        Ok(identity) => Some(identity),
        Err(e) => {
            log::warn!("Ignoring consumer certificate in {}: {}", dir.display(), e);
            None
        }
    }
}

// ==================== Satellite 5 ====================

/// Endpoint of the Satellite 5 XML-RPC API for a server given by the operator.
pub fn satellite_url(server: &str) -> String {
    let server = server.trim();
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    };
    let path_start = with_scheme
        .find("://")
        .map(|i| i + 3)
        .and_then(|start| with_scheme[start..].find('/').map(|p| start + p));
    match path_start {
        Some(i) if !with_scheme[i..].trim_end_matches('/').is_empty() => with_scheme,
        Some(i) => format!("{}/rpc/api", &with_scheme[..i]),
        None => format!("{}/rpc/api", with_scheme),
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Encode an XML-RPC call with string parameters.
pub fn xmlrpc_request(method: &str, params: &[&str]) -> String {
    let mut body = format!(
        "<?xml version=\"1.0\"?>\n<methodCall><methodName>{}</methodName><params>",
        xml_escape(method)
    );
    for param in params {
        body.push_str(&format!(
            "<param><value><string>{}</string></value></param>",
            xml_escape(param)
        ));
    }
    body.push_str("</params></methodCall>\n");
    body
}

/// Extract the scalar result of an XML-RPC response. Faults become backend errors.
pub fn xmlrpc_response(body: &str) -> ConnectorResult<String> {
    let regex = |pattern: &str| {
        Regex::new(pattern).map_err(|e| ConnectorError::Unexpected(e.to_string()))
    };

    if body.contains("<fault>") {
        let fault = regex(
            r"(?s)<name>faultString</name>\s*<value>\s*(?:<string>)?(.*?)(?:</string>)?\s*</value>",
        )?;
        let message = fault
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| xml_unescape(m.as_str()))
            .unwrap_or_else(|| "unknown fault".to_string());
        return Err(ConnectorError::Backend(format!("XML-RPC fault: {}", message)));
    }

    let value = regex(r"(?s)<params>\s*<param>\s*<value>\s*(?:<[a-z0-9.]+>)?([^<]*)")?;
    value
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| xml_unescape(m.as_str().trim()))
        .ok_or_else(|| ConnectorError::Backend("Malformed XML-RPC response".to_string()))
}

/// XML-RPC client for Satellite 5.
pub struct Satellite5Connector {
    url: String,
    username: String,
    password: String,
    timeout: Duration,
    client: Option<Client>,
    session: Option<String>,
}

impl Satellite5Connector {
    pub fn new(server: &str, username: &str, password: &str, timeout: Duration) -> Self {
        Self {
            url: satellite_url(server),
            username: username.to_string(),
            password: password.to_string(),
            timeout,
            client: None,
            session: None,
        }
    }

    fn call(&self, method: &str, params: &[&str]) -> ConnectorResult<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ConnectorError::Unexpected("not connected".to_string()))?;
        log::debug!("XML-RPC {} at {}", method, self.url);

        let body = client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xmlrpc_request(method, params))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(classify)?;
        xmlrpc_response(&body)
    }
}

impl ReportingTargetConnector for Satellite5Connector {
    fn connect(&mut self) -> ConnectorResult<()> {
        parse_url(&self.url)?;
        self.client = Some(build(builder(self.timeout))?);
        let session = self.call("auth.login", &[self.username.as_str(), self.password.as_str()])?;
        log::info!("Logged in to {}", self.url);
        self.session = Some(session);
        Ok(())
    }

    fn logout(&mut self) -> ConnectorResult<()> {
        if let Some(session) = self.session.take() {
            self.call("auth.logout", &[session.as_str()])?;
        }
        Ok(())
    }
}

// ==================== Factory ====================

/// Builds real network connectors from the wizard settings.
pub struct RemoteConnectors {
    rhsm_conf: PathBuf,
    ca_dir: PathBuf,
    consumer_dir: PathBuf,
    timeout: Duration,
}

impl RemoteConnectors {
    pub fn new(settings: &Settings) -> Self {
        Self {
            rhsm_conf: settings.paths.rhsm_conf.clone(),
            ca_dir: settings.paths.rhsm_ca_dir.clone(),
            consumer_dir: settings.paths.consumer_dir.clone(),
            timeout: settings.http_timeout(),
        }
    }
}

impl ConnectorFactory for RemoteConnectors {
    fn reporting_target(&self, model: &ConfigModel) -> Result<Box<dyn ReportingTargetConnector>> {
        match model.sm_type() {
            Some(SmType::SubscriptionManager) => {
                let rhsm_conf = fs::read_to_string(&self.rhsm_conf).unwrap_or_else(|e| {
                    log::debug!("Cannot read {}: {}", self.rhsm_conf.display(), e);
                    String::new()
                });
                Ok(Box::new(RhsmConnector::new(
                    RhsmSettings::resolve(model, &rhsm_conf),
                    self.ca_dir.clone(),
                    self.consumer_dir.clone(),
                    self.timeout,
                )))
            }
            Some(SmType::Satellite5) => Ok(Box::new(Satellite5Connector::new(
                &model.sat_server,
                &model.sat_username,
                &model.sat_password,
                self.timeout,
            ))),
            None => Err(Error::unexpected("no reporting target selected")),
        }
    }
}
