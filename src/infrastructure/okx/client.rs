//! OKX v5 REST `ExchangeGateway`. Every call goes through `get`/`post`,
//! which sign private requests, parse OKX's `{code, msg, data}` envelope,
//! and surface a non-zero `code` as an error carrying OKX's own message so
//! callers (the live executor's posSide retry, in particular) can pattern
//! match on it.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::config::okx_config::OkxEnvConfig;
use crate::domain::exchange::{
    BalanceReply, ExchangeGateway, ExchangeOrderReply, ExchangeTradeReply, FeeInfo, FundingRateReply, OhlcvBar,
    OpenInterestReply, OrderParams, PositionReply, TickerReply,
};
use crate::domain::trading::types::{OrderSide, OrderType};
use crate::infrastructure::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::infrastructure::http_client_factory::{build_url_with_query, HttpClientFactory};
use crate::infrastructure::okx::signing::{iso_timestamp_now, sign};
use std::time::Duration;

pub struct OkxGateway {
    http: reqwest_middleware::ClientWithMiddleware,
    config: OkxEnvConfig,
    breaker: CircuitBreaker,
}

impl OkxGateway {
    pub fn new(config: OkxEnvConfig) -> Self {
        let breaker = CircuitBreaker::new("okx", 5, 2, Duration::from_secs(30));
        Self { http: HttpClientFactory::create_client(), config, breaker }
    }

    async fn send(&self, request: reqwest_middleware::RequestBuilder) -> anyhow::Result<reqwest::Response> {
        self.breaker.call(request.send()).await.map_err(|e| match e {
            CircuitBreakerError::Open(msg) => anyhow::anyhow!(msg),
            CircuitBreakerError::Inner(err) => anyhow::Error::from(err),
        })
    }

    fn auth_headers(&self, method: &str, request_path: &str, body: &str) -> anyhow::Result<HeaderMap> {
        let timestamp = iso_timestamp_now();
        let signature = sign(&self.config.api_secret, &timestamp, method, request_path, body);
        let mut headers = HeaderMap::new();
        headers.insert("OK-ACCESS-KEY", HeaderValue::from_str(&self.config.api_key)?);
        headers.insert("OK-ACCESS-SIGN", HeaderValue::from_str(&signature)?);
        headers.insert("OK-ACCESS-TIMESTAMP", HeaderValue::from_str(&timestamp)?);
        headers.insert("OK-ACCESS-PASSPHRASE", HeaderValue::from_str(&self.config.passphrase)?);
        headers.insert(reqwest::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if self.config.is_demo {
            headers.insert(HeaderName::from_static("x-simulated-trading"), HeaderValue::from_static("1"));
        }
        Ok(headers)
    }

    async fn get(&self, path: &str, params: &[(String, String)], signed: bool) -> anyhow::Result<Vec<Value>> {
        let path_and_query = build_url_with_query(path, params);
        let url = format!("{}{}", self.config.base_url, path_and_query);
        let mut request = self.http.get(&url);
        if signed {
            request = request.headers(self.auth_headers("GET", &path_and_query, "")?);
        }
        let response = self.send(request).await?;
        Self::parse_envelope(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Vec<Value>> {
        let body_str = body.to_string();
        let url = format!("{}{}", self.config.base_url, path);
        let request = self.http.post(&url).headers(self.auth_headers("POST", path, &body_str)?).body(body_str);
        let response = self.send(request).await?;
        Self::parse_envelope(response).await
    }

    async fn parse_envelope(response: reqwest::Response) -> anyhow::Result<Vec<Value>> {
        let status = response.status();
        let body: Value = response.json().await?;
        let code = body.get("code").and_then(Value::as_str).unwrap_or("");
        if code != "0" {
            let msg = body.get("msg").and_then(Value::as_str).unwrap_or("");
            anyhow::bail!("OKX error (http {status}, code {code}): {msg}");
        }
        Ok(body.get("data").and_then(Value::as_array).cloned().unwrap_or_default())
    }
}

fn side_to_okx(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn okx_to_side(s: &str) -> Option<OrderSide> {
    match s.to_lowercase().as_str() {
        "buy" | "long" => Some(OrderSide::Buy),
        "sell" | "short" => Some(OrderSide::Sell),
        _ => None,
    }
}

fn order_type_to_okx(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
    }
}

fn str_field(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

fn decimal_field(row: &Value, key: &str) -> Option<Decimal> {
    str_field(row, key).and_then(|s| Decimal::from_str(&s).ok())
}

fn i64_field(row: &Value, key: &str) -> Option<i64> {
    str_field(row, key).and_then(|s| s.parse::<i64>().ok())
}

fn fee_field(row: &Value) -> Option<FeeInfo> {
    let cost = decimal_field(row, "fee")?.abs();
    let currency = str_field(row, "feeCcy")?;
    Some(FeeInfo { cost, currency })
}

fn order_reply_from_row(row: &Value) -> ExchangeOrderReply {
    ExchangeOrderReply {
        exchange_order_id: str_field(row, "ordId").unwrap_or_default(),
        status: str_field(row, "state").unwrap_or_else(|| "live".to_string()),
        filled: decimal_field(row, "fillSz").or(Some(Decimal::ZERO)),
        amount: decimal_field(row, "sz"),
        average: decimal_field(row, "avgPx"),
        fee: fee_field(row),
        ts_ms: i64_field(row, "uTime").or_else(|| i64_field(row, "cTime")).unwrap_or(0),
    }
}

#[async_trait]
impl ExchangeGateway for OkxGateway {
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<OhlcvBar>> {
        let limit_str = limit.min(300).to_string();
        let mut params = vec![("instId".to_string(), symbol.to_string()), ("bar".to_string(), timeframe.to_string()), ("limit".to_string(), limit_str)];
        if let Some(since) = since_ms {
            // OKX returns records strictly newer than `before`, newest first.
            params.push(("before".to_string(), since.to_string()));
        }
        let rows = self.get("/api/v5/market/candles", &params, false).await?;
        let mut bars: Vec<OhlcvBar> = rows
            .iter()
            .filter_map(|row| {
                let arr = row.as_array()?;
                Some(OhlcvBar {
                    ts_ms: arr.first()?.as_str()?.parse().ok()?,
                    open: Decimal::from_str(arr.get(1)?.as_str()?).ok()?,
                    high: Decimal::from_str(arr.get(2)?.as_str()?).ok()?,
                    low: Decimal::from_str(arr.get(3)?.as_str()?).ok()?,
                    close: Decimal::from_str(arr.get(4)?.as_str()?).ok()?,
                    volume: Decimal::from_str(arr.get(5)?.as_str()?).ok()?,
                })
            })
            .collect();
        bars.sort_by_key(|b| b.ts_ms);
        if let Some(since) = since_ms {
            bars.retain(|b| b.ts_ms > since);
        }
        bars.truncate(limit as usize);
        Ok(bars)
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> anyhow::Result<FundingRateReply> {
        let params = vec![("instId".to_string(), symbol.to_string())];
        let rows = self.get("/api/v5/public/funding-rate", &params, false).await?;
        let row = rows.first().ok_or_else(|| anyhow::anyhow!("OKX returned no funding rate row for {symbol}"))?;
        Ok(FundingRateReply {
            ts_ms: i64_field(row, "ts").unwrap_or(0),
            rate: decimal_field(row, "fundingRate").unwrap_or(Decimal::ZERO),
            next_funding_ts: i64_field(row, "fundingTime"),
        })
    }

    async fn fetch_ticker(&self, symbol: &str) -> anyhow::Result<TickerReply> {
        let params = vec![("instId".to_string(), symbol.to_string())];
        let rows = self.get("/api/v5/market/ticker", &params, false).await?;
        let row = rows.first().ok_or_else(|| anyhow::anyhow!("OKX returned no ticker row for {symbol}"))?;
        let ts_ms = i64_field(row, "ts").unwrap_or(0);
        let last = decimal_field(row, "last");

        let mark = match self.get("/api/v5/public/mark-price", &[("instId".to_string(), symbol.to_string())], false).await {
            Ok(rows) => rows.first().and_then(|r| decimal_field(r, "markPx")),
            Err(_) => None,
        };

        Ok(TickerReply { ts_ms, last, mark, index: None })
    }

    async fn fetch_open_interest(&self, symbol: &str) -> anyhow::Result<OpenInterestReply> {
        let params = vec![("instId".to_string(), symbol.to_string())];
        let rows = self.get("/api/v5/public/open-interest", &params, false).await?;
        let row = rows.first();
        Ok(OpenInterestReply {
            ts_ms: row.and_then(|r| i64_field(r, "ts")).unwrap_or(0),
            open_interest: row.and_then(|r| decimal_field(r, "oi")),
            open_interest_value: row.and_then(|r| decimal_field(r, "oiCcy")),
        })
    }

    async fn fetch_balance(&self) -> anyhow::Result<BalanceReply> {
        let rows = self.get("/api/v5/account/balance", &[], true).await?;
        let mut total = Vec::new();
        let mut free = Vec::new();
        let mut used = Vec::new();
        let ts_ms = rows.first().and_then(|r| i64_field(r, "uTime")).unwrap_or(0);
        for account in &rows {
            let Some(details) = account.get("details").and_then(Value::as_array) else { continue };
            for detail in details {
                let Some(ccy) = str_field(detail, "ccy") else { continue };
                total.push((ccy.clone(), decimal_field(detail, "cashBal").unwrap_or(Decimal::ZERO)));
                free.push((ccy.clone(), decimal_field(detail, "availBal").unwrap_or(Decimal::ZERO)));
                used.push((ccy, decimal_field(detail, "frozenBal").unwrap_or(Decimal::ZERO)));
            }
        }
        Ok(BalanceReply { ts_ms, total, free, used })
    }

    async fn fetch_positions(&self, symbols: Option<&[String]>) -> anyhow::Result<Vec<PositionReply>> {
        let mut params = vec![("instType".to_string(), "SWAP".to_string())];
        if let Some(symbols) = symbols {
            params.push(("instId".to_string(), symbols.join(",")));
        }
        let rows = self.get("/api/v5/account/positions", &params, true).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let symbol = str_field(row, "instId")?;
                let raw_size = decimal_field(row, "pos").unwrap_or(Decimal::ZERO);
                if raw_size.is_zero() {
                    return None;
                }
                let side = match str_field(row, "posSide").as_deref() {
                    Some("long") => Some(OrderSide::Buy),
                    Some("short") => Some(OrderSide::Sell),
                    _ => Some(if raw_size.is_sign_positive() { OrderSide::Buy } else { OrderSide::Sell }),
                };
                Some(PositionReply {
                    symbol,
                    side,
                    size: raw_size.abs(),
                    entry_price: decimal_field(row, "avgPx"),
                    mark_price: decimal_field(row, "markPx"),
                    unrealized_pnl: decimal_field(row, "upl"),
                    leverage: decimal_field(row, "lever"),
                    margin: decimal_field(row, "margin"),
                    liquidation_price: decimal_field(row, "liqPx"),
                })
            })
            .collect())
    }

    async fn create_order(&self, symbol: &str, order_type: OrderType, side: OrderSide, qty: Decimal, price: Option<Decimal>, params: &OrderParams) -> anyhow::Result<ExchangeOrderReply> {
        let mut body = json!({
            "instId": symbol,
            "tdMode": params.td_mode.clone().unwrap_or_else(|| "cross".to_string()),
            "side": side_to_okx(side),
            "ordType": order_type_to_okx(order_type),
            "sz": qty.to_string(),
        });
        if let Some(pos_side) = &params.pos_side {
            body["posSide"] = json!(pos_side);
        }
        if let Some(price) = price {
            body["px"] = json!(price.to_string());
        }
        if let Some(leverage) = params.leverage {
            body["lever"] = json!(leverage.to_string());
        }
        let rows = self.post("/api/v5/trade/order", &body).await?;
        let row = rows.first().ok_or_else(|| anyhow::anyhow!("OKX create_order returned no rows"))?;
        let s_code = str_field(row, "sCode").unwrap_or_default();
        if s_code != "0" {
            let s_msg = str_field(row, "sMsg").unwrap_or_default();
            anyhow::bail!("OKX order rejected (sCode {s_code}): {s_msg}");
        }
        Ok(ExchangeOrderReply {
            exchange_order_id: str_field(row, "ordId").unwrap_or_default(),
            status: "live".to_string(),
            filled: Some(Decimal::ZERO),
            amount: Some(qty),
            average: None,
            fee: None,
            ts_ms: i64_field(row, "ts").unwrap_or(0),
        })
    }

    async fn fetch_order(&self, exchange_order_id: &str, symbol: &str) -> anyhow::Result<ExchangeOrderReply> {
        let params = vec![("instId".to_string(), symbol.to_string()), ("ordId".to_string(), exchange_order_id.to_string())];
        let rows = self.get("/api/v5/trade/order", &params, true).await?;
        let row = rows.first().ok_or_else(|| anyhow::anyhow!("OKX returned no order row for {exchange_order_id}"))?;
        Ok(order_reply_from_row(row))
    }

    async fn cancel_order(&self, exchange_order_id: &str, symbol: &str) -> anyhow::Result<()> {
        let body = json!({ "instId": symbol, "ordId": exchange_order_id });
        let rows = self.post("/api/v5/trade/cancel-order", &body).await?;
        let row = rows.first().ok_or_else(|| anyhow::anyhow!("OKX cancel_order returned no rows"))?;
        let s_code = str_field(row, "sCode").unwrap_or_default();
        if s_code != "0" {
            let s_msg = str_field(row, "sMsg").unwrap_or_default();
            anyhow::bail!("OKX cancel rejected (sCode {s_code}): {s_msg}");
        }
        Ok(())
    }

    async fn fetch_open_orders(&self, symbol: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<ExchangeOrderReply>> {
        let mut params = vec![("instId".to_string(), symbol.to_string()), ("limit".to_string(), limit.min(100).to_string())];
        if let Some(since) = since_ms {
            params.push(("before".to_string(), since.to_string()));
        }
        let rows = self.get("/api/v5/trade/orders-pending", &params, true).await?;
        Ok(rows.iter().map(order_reply_from_row).collect())
    }

    async fn fetch_closed_orders(&self, symbol: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<ExchangeOrderReply>> {
        let mut params = vec![
            ("instId".to_string(), symbol.to_string()),
            ("instType".to_string(), "SWAP".to_string()),
            ("limit".to_string(), limit.min(100).to_string()),
        ];
        if let Some(since) = since_ms {
            params.push(("before".to_string(), since.to_string()));
        }
        let rows = self.get("/api/v5/trade/orders-history", &params, true).await?;
        Ok(rows.iter().map(order_reply_from_row).collect())
    }

    async fn fetch_my_trades(&self, symbol: &str, since_ms: Option<i64>, limit: u32) -> anyhow::Result<Vec<ExchangeTradeReply>> {
        let mut params = vec![("instId".to_string(), symbol.to_string()), ("limit".to_string(), limit.min(100).to_string())];
        if let Some(since) = since_ms {
            params.push(("before".to_string(), since.to_string()));
        }
        let rows = self.get("/api/v5/trade/fills", &params, true).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(ExchangeTradeReply {
                    exchange_order_id: str_field(row, "ordId")?,
                    symbol: str_field(row, "instId")?,
                    side: okx_to_side(&str_field(row, "side")?)?,
                    price: decimal_field(row, "fillPx")?,
                    amount: decimal_field(row, "fillSz")?,
                    fee: fee_field(row),
                    ts_ms: i64_field(row, "ts").unwrap_or(0),
                })
            })
            .collect())
    }

    fn rate_limit_ms(&self) -> u64 {
        // OKX's general REST bucket is 20 requests / 2s per endpoint; 120ms
        // keeps a single-symbol ingestion loop well under that.
        120
    }
}
