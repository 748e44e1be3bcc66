//! Main scanning engine implementation

use crate::config::ScanConfig;
use crate::intelligence::{self, Classification, DeviceClassifier, Evidence, RuleClassifier};
use crate::network::{
    is_http_port, Credentials, HttpFingerprinter, HttpProbe, PortProber, ReqwestFingerprinter,
    TcpConnectProber,
};
use crate::scanner::{
    ActiveScanRegistry, ChunkedExecutor, DeviceRecord, ScanAdmission, ScanLease, ScanReport,
    ScanRequest, ScanStats,
};
use crate::utils::Logger;
use crate::ScanError;
use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Result of probing a single address outside of a range scan
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceStatus {
    Online(DeviceRecord),
    Offline,
}

/// Port results for one address
#[derive(Debug, Clone)]
struct HostProbe {
    address: Ipv4Addr,
    open_ports: BTreeSet<u16>,
    latency_ms: Option<u64>,
    probes_sent: u64,
}

impl HostProbe {
    fn is_responsive(&self) -> bool {
        !self.open_ports.is_empty()
    }

    /// Lowest open HTTP-capable port
    fn http_port(&self) -> Option<u16> {
        self.open_ports.iter().copied().find(|&p| is_http_port(p))
    }
}

/// Main scanning engine
pub struct ScanEngine {
    config: ScanConfig,
    prober: Arc<dyn PortProber>,
    fingerprinter: Option<Arc<dyn HttpFingerprinter>>,
    classifier: Arc<dyn DeviceClassifier>,
    admission: Arc<dyn ScanAdmission>,
}

impl ScanEngine {
    /// Create a new scan engine with the default prober, fingerprinter, classifier and a private registry
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        config.validate()?;

        let fingerprinter: Option<Arc<dyn HttpFingerprinter>> = if config.http_fingerprint {
            Some(Arc::new(ReqwestFingerprinter::new()?))
        } else {
            None
        };

        Ok(Self {
            config,
            prober: Arc::new(TcpConnectProber::new()),
            fingerprinter,
            classifier: Arc::new(RuleClassifier::new()),
            admission: Arc::new(ActiveScanRegistry::new()),
        })
    }

    pub fn with_prober(mut self, prober: Arc<dyn PortProber>) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn HttpFingerprinter>) -> Self {
        self.fingerprinter = Some(fingerprinter);
        self
    }

    pub fn without_fingerprinter(mut self) -> Self {
        self.fingerprinter = None;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn DeviceClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Share admission control with other engines
    pub fn with_registry(mut self, admission: Arc<dyn ScanAdmission>) -> Self {
        self.admission = admission;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn executor(&self) -> ChunkedExecutor {
        ChunkedExecutor::new(self.config.chunk_size, self.config.chunk_delay())
    }

    /// Perform the main scan operation.
    ///
    /// Fails only on an oversized range or when a scan over the same range is
    /// already running. Every responsive address is reported; a classifier
    /// failure on one address falls back to the built-in rules for it.
    pub async fn scan(&self, request: &ScanRequest) -> crate::Result<ScanReport> {
        let range = *request.range();
        if range.len() > self.config.max_addresses {
            return Err(ScanError::InvalidRange(format!(
                "{} covers {} addresses (max: {})",
                range,
                range.len(),
                self.config.max_addresses
            )));
        }

        let key = request.range_key();
        let _lease = ScanLease::acquire(self.admission.clone(), key.clone())
            .ok_or_else(|| ScanError::ScanInProgress(key.clone()))?;

        let started_at = Utc::now();
        let start_time = Instant::now();
        let ports: Vec<u16> = request.ports().iter().copied().collect();
        Logger::log_scan_start(&key, range.len(), ports.len());

        let executor = self.executor();
        let mut stats = ScanStats {
            addresses_scanned: range.len(),
            ..ScanStats::default()
        };

        // Phase 1: connect probes, chunk by chunk
        let probe_timeout = self.config.probe_timeout();
        let engine = self;
        let port_list = &ports;
        let hosts = executor
            .run(range.iter().collect(), move |address| {
                engine.probe_host(address, port_list, probe_timeout)
            })
            .await;

        stats.probes_sent = hosts.iter().map(|h| h.probes_sent).sum();
        stats.reachable_probes = hosts.iter().map(|h| h.open_ports.len() as u64).sum();
        let responsive: Vec<HostProbe> = hosts.into_iter().filter(HostProbe::is_responsive).collect();
        log::info!("{} of {} addresses responded on {}", responsive.len(), range.len(), key);

        // Phase 2: best-effort HTTP fingerprints
        let fingerprinted = self.fingerprint_hosts(&executor, responsive, None).await;
        stats.http_fingerprints = fingerprinted.iter().filter(|(_, http)| http.is_some()).count() as u64;

        // Phase 3: classification
        let mut devices = Vec::with_capacity(fingerprinted.len());
        for (host, http) in fingerprinted {
            let classification = self.classify_host(&host, http.as_ref()).unwrap_or_else(|e| {
                log::warn!("Classifier failed for {}: {}; using built-in rules", host.address, e);
                stats.classification_failures += 1;
                intelligence::classify(&Evidence::new(host.address, &host.open_ports, http.as_ref()))
            });
            devices.push(DeviceRecord::new(
                host.address,
                host.open_ports,
                classification,
                host.latency_ms,
                http,
            ));
        }
        devices.sort_by_key(|d| d.address);

        let duration = start_time.elapsed();
        stats.duration_ms = duration.as_millis() as u64;

        let report = ScanReport {
            scan_id: Uuid::new_v4(),
            requested_range: key.clone(),
            ports,
            devices,
            started_at,
            finished_at: Utc::now(),
            stats,
        };

        Logger::log_scan_complete(&key, duration, report.total_devices(), report.cameras());
        Ok(report)
    }

    /// Probe, fingerprint and classify a single address.
    ///
    /// An empty `ports` slice falls back to the configured profile. Does not
    /// take part in range admission control.
    pub async fn test_device(
        &self,
        address: Ipv4Addr,
        ports: &[u16],
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> DeviceStatus {
        let ports = if ports.is_empty() {
            self.config.profile.ports()
        } else {
            ports.to_vec()
        };
        let probe_timeout = timeout.unwrap_or_else(|| self.config.probe_timeout());

        let host = self.probe_host(address, &ports, probe_timeout).await;
        if !host.is_responsive() {
            log::info!("{} is offline", address);
            return DeviceStatus::Offline;
        }

        let http = match (&self.fingerprinter, host.http_port()) {
            (Some(fingerprinter), Some(port)) => {
                let http_timeout = timeout.unwrap_or_else(|| self.config.http_timeout());
                fingerprinter
                    .fingerprint(SocketAddrV4::new(address, port), http_timeout, credentials)
                    .await
            }
            _ => None,
        };

        let classification = self.classify_host(&host, http.as_ref()).unwrap_or_else(|e| {
            log::warn!("Classifier failed for {}: {}; using built-in rules", address, e);
            intelligence::classify(&Evidence::new(address, &host.open_ports, http.as_ref()))
        });

        DeviceStatus::Online(DeviceRecord::new(
            address,
            host.open_ports,
            classification,
            host.latency_ms,
            http,
        ))
    }

    /// Probe every port of one address concurrently
    async fn probe_host(&self, address: Ipv4Addr, ports: &[u16], timeout: Duration) -> HostProbe {
        let probes = ports.iter().map(|&port| self.prober.probe(address, port, timeout));
        let results = join_all(probes).await;

        let mut host = HostProbe {
            address,
            open_ports: BTreeSet::new(),
            latency_ms: None,
            probes_sent: results.len() as u64,
        };

        for result in results.into_iter().filter(|r| r.reachable) {
            host.open_ports.insert(result.port);
            if let Some(latency) = result.latency_ms {
                host.latency_ms = Some(host.latency_ms.map_or(latency, |best| best.min(latency)));
            }
        }

        if host.is_responsive() {
            log::debug!("{} open ports: {:?}", address, host.open_ports);
        }
        host
    }

    async fn fingerprint_hosts(
        &self,
        executor: &ChunkedExecutor,
        hosts: Vec<HostProbe>,
        credentials: Option<&Credentials>,
    ) -> Vec<(HostProbe, Option<HttpProbe>)> {
        let fingerprinter = match &self.fingerprinter {
            Some(fingerprinter) => fingerprinter.clone(),
            None => return hosts.into_iter().map(|host| (host, None)).collect(),
        };

        let http_timeout = self.config.http_timeout();
        executor
            .run(hosts, move |host| {
                let fingerprinter = fingerprinter.clone();
                async move {
                    let http = match host.http_port() {
                        Some(port) => {
                            fingerprinter
                                .fingerprint(SocketAddrV4::new(host.address, port), http_timeout, credentials)
                                .await
                        }
                        None => None,
                    };
                    (host, http)
                }
            })
            .await
    }

    /// Run the classifier, turning a panic into an error
    fn classify_host(&self, host: &HostProbe, http: Option<&HttpProbe>) -> crate::Result<Classification> {
        let evidence = Evidence::new(host.address, &host.open_ports, http);
        match catch_unwind(AssertUnwindSafe(|| self.classifier.classify(&evidence))) {
            Ok(result) => result,
            Err(_) => Err(ScanError::ClassificationError(format!(
                "classifier panicked for {}",
                host.address
            ))),
        }
    }
}
