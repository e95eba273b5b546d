use crate::config::{AuthType, HttpClientConfig, RemoteRuleConfig, RetryConfig, RuleFormat};
use crate::domain::normalize;
use crate::error::{AppError, HttpClientError, InvalidProxyConfig};
use crate::metrics::METRICS;
use crate::r#const::{fetch_labels, retry_limits};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use retry_policies::Jitter;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

use super::parser::{GfwListParser, PlainListParser, RuleParser};

/// 远程规则加载器
pub struct RemoteRuleLoader {
    client: ClientWithMiddleware,
    config: RemoteRuleConfig,
    parser: Box<dyn RuleParser>,
}

impl RemoteRuleLoader {
    /// 创建新的远程规则加载器
    pub fn new(config: RemoteRuleConfig, http_config: HttpClientConfig) -> Result<Self, AppError> {
        let client =
            Self::create_http_client(&http_config, config.proxy.as_deref(), config.retry.as_ref())?;

        // 根据配置的格式选择解析器
        let parser: Box<dyn RuleParser> = match config.format {
            RuleFormat::Gfwlist => Box::new(GfwListParser),
            RuleFormat::Plain => Box::new(PlainListParser),
        };

        Ok(Self {
            client,
            config,
            parser,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// 创建HTTP客户端
    fn create_http_client(
        config: &HttpClientConfig,
        proxy: Option<&str>,
        retry_config: Option<&RetryConfig>,
    ) -> Result<ClientWithMiddleware, AppError> {
        debug!(
            "Creating HTTP client for auto list, config: {:?}, proxy: {:?}, retry_config: {:?}",
            config, proxy, retry_config
        );

        let mut client_builder = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout));

        if let Some(keepalive) = config.keepalive {
            client_builder = client_builder.tcp_keepalive(Duration::from_secs(keepalive as u64));
        }

        if let Some(idle_timeout) = config.idle_timeout {
            client_builder = client_builder.pool_idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(ref agent) = config.agent {
            client_builder = client_builder.user_agent(agent);
        }

        // 列表地址本身可能需要通过代理访问
        if let Some(proxy_url) = proxy {
            client_builder = client_builder.proxy(reqwest::Proxy::all(proxy_url).map_err(|e| {
                AppError::InvalidProxy(InvalidProxyConfig(format!(
                    "Proxy configuration error: {}",
                    e
                )))
            })?);
        }

        let client = client_builder.build().map_err(|e| {
            AppError::HttpError(HttpClientError(format!(
                "Failed to create HTTP client: {}",
                e
            )))
        })?;

        let middleware_client = match retry_config {
            Some(retry) => {
                // 指数退避，基数必须大于 1
                let retry_policy = ExponentialBackoff::builder()
                    .retry_bounds(
                        Duration::from_secs(retry.delay as u64),
                        Duration::from_secs(retry_limits::MAX_DELAY as u64),
                    )
                    .base(2)
                    .jitter(Jitter::Bounded)
                    .build_with_max_retries(retry.attempts);

                ClientBuilder::new(client)
                    .with(RetryTransientMiddleware::new_with_policy(retry_policy))
                    .build()
            }
            None => ClientBuilder::new(client).build(),
        };

        Ok(middleware_client)
    }

    async fn fetch(&self) -> Result<String, AppError> {
        let mut request = self.client.get(&self.config.url);

        if let Some(auth) = &self.config.auth {
            request = match auth.r#type {
                AuthType::Basic => {
                    let username = auth.username.as_deref().unwrap_or("");
                    let password = auth.password.as_deref().unwrap_or("");
                    request.basic_auth(username, Some(password))
                }
                AuthType::Bearer => request.bearer_auth(auth.token.as_deref().unwrap_or("")),
            };
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AppError::RemoteRule(format!(
                "Failed to fetch auto list, status: {}",
                response.status()
            )));
        }

        let content = response.text().await?;
        if content.len() > self.config.max_size {
            return Err(AppError::RemoteRule(format!(
                "Auto list size ({} bytes) exceeds configured limit ({} bytes)",
                content.len(),
                self.config.max_size
            )));
        }

        Ok(content)
    }

    /// 拉取并解析自动列表
    ///
    /// 结果已规范化、去重并排序，种子域名总是包含在内。
    pub async fn load(&self) -> Result<Vec<String>, AppError> {
        debug!("Loading auto list from URL: {:?}", self.config.url);

        let result = match self.fetch().await {
            Ok(content) => self.parser.parse(&content),
            Err(e) => Err(e),
        };

        let label = if result.is_ok() {
            fetch_labels::SUCCESS
        } else {
            fetch_labels::FAILURE
        };
        METRICS
            .remote_rule_fetch_total()
            .with_label_values(&[label])
            .inc();

        let parsed = result?;
        let parsed_count = parsed.len();

        let mut domains: BTreeSet<String> = parsed.into_iter().collect();
        domains.extend(
            self.config
                .seed_domains
                .iter()
                .filter_map(|seed| normalize(seed))
                .map(String::from),
        );

        info!(
            "Loaded {} domains from {:?} ({} parsed, {} after seeding)",
            domains.len(),
            self.config.url,
            parsed_count,
            domains.len()
        );

        Ok(domains.into_iter().collect())
    }
}
