//! WiFi station and HTTP transport over embassy-net
//!
//! [`StationNetwork`] owns the esp-radio controller and a handle on the
//! embassy-net stack. The stack's runner must be driven by its own task, see
//! [`net_task`]. Uploads go through `reqwless` on top of the stack's TCP and
//! DNS sockets.

use airsense_core::network::{Header, HttpClient, WifiLink};
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::{Runner, Stack};
use embassy_time::{Duration, with_timeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiError};
use heapless::Vec;
use log::{debug, info};
use reqwless::client::HttpClient as RequestClient;
use reqwless::request::{Method, RequestBuilder};
use thiserror_no_std::Error;

/// How long to wait for a DHCP lease after the link comes up.
const DHCP_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on one upload, from DNS lookup to response head.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const RX_BUFFER_SIZE: usize = 1024;
const TX_BUFFER_SIZE: usize = 1024;
/// Holds the response head.
const RESPONSE_BUFFER_SIZE: usize = 1024;
const MAX_HEADERS: usize = 4;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("WiFi driver error: {0:?}")]
    Wifi(WifiError),
    #[error("no DHCP lease")]
    DhcpTimeout,
    #[error("too many request headers")]
    TooManyHeaders,
    #[error("request timed out")]
    Timeout,
    #[error("HTTP request failed: {0:?}")]
    Http(reqwless::Error),
}

pub struct StationNetwork {
    controller: WifiController<'static>,
    stack: Stack<'static>,
}

impl StationNetwork {
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>) -> Self {
        Self { controller, stack }
    }
}

impl WifiLink for StationNetwork {
    type Error = NetError;

    async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        let config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(ssid.into())
                .with_password(password.into()),
        );
        self.controller
            .set_config(&config)
            .map_err(NetError::Wifi)?;

        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await.map_err(NetError::Wifi)?;
        }
        self.controller
            .connect_async()
            .await
            .map_err(NetError::Wifi)?;

        with_timeout(DHCP_TIMEOUT, self.stack.wait_config_up())
            .await
            .map_err(|_| NetError::DhcpTimeout)?;

        if let Some(config) = self.stack.config_v4() {
            info!("Got IP address {}", config.address);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up()
    }
}

impl HttpClient for StationNetwork {
    type Error = NetError;

    async fn post(
        &mut self,
        url: &str,
        headers: &[Header<'_>],
        body: &[u8],
    ) -> Result<u16, Self::Error> {
        let mut fields: Vec<(&str, &str), MAX_HEADERS> = Vec::new();
        for header in headers {
            fields
                .push((header.name, header.value))
                .map_err(|_| NetError::TooManyHeaders)?;
        }

        let state = TcpClientState::<1, TX_BUFFER_SIZE, RX_BUFFER_SIZE>::new();
        let tcp = TcpClient::new(self.stack, &state);
        let dns = DnsSocket::new(self.stack);
        let mut client = RequestClient::new(&tcp, &dns);
        let mut rx_buffer = [0u8; RESPONSE_BUFFER_SIZE];

        debug!("POST {} ({} bytes)", url, body.len());
        let exchange = async {
            let mut request = client
                .request(Method::POST, url)
                .await?
                .headers(fields.as_slice())
                .body(body);
            let response = request.send(&mut rx_buffer).await?;
            Ok::<_, reqwless::Error>(response.status.0)
        };

        with_timeout(REQUEST_TIMEOUT, exchange)
            .await
            .map_err(|_| NetError::Timeout)?
            .map_err(NetError::Http)
    }
}

/// Drives the network stack. Spawn once at boot.
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
