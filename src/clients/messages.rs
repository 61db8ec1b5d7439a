// Wire messages for the pumpportal-style launch feed

use serde_json::{json, Value};

pub fn subscribe_new_token() -> Value {
    json!({ "method": "subscribeNewToken" })
}

pub fn subscribe_token_trade(mints: &[String]) -> Value {
    json!({ "method": "subscribeTokenTrade", "keys": mints })
}

pub fn unsubscribe_token_trade(mints: &[String]) -> Value {
    json!({ "method": "unsubscribeTokenTrade", "keys": mints })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    NewToken,
    Trade,
    Other,
}

/// Any `txType` other than "create" marks a trade; otherwise a `mint` marks a launch
pub fn classify(frame: &Value) -> FrameKind {
    match frame.get("txType").and_then(Value::as_str) {
        Some(tx_type) if tx_type != "create" => FrameKind::Trade,
        _ if frame.get("mint").is_some() => FrameKind::NewToken,
        _ => FrameKind::Other,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTokenFrame {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub creator: String,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeFrame {
    pub mint: String,
    pub price: f64,
    pub market_cap_sol: f64,
}

fn non_empty_str<'a>(frame: &'a Value, key: &str) -> Option<&'a str> {
    frame.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Launch frame; needs a mint and a creator wallet
pub fn parse_new_token(frame: &Value) -> Option<NewTokenFrame> {
    let mint = non_empty_str(frame, "mint")?;
    let creator = non_empty_str(frame, "traderPublicKey")
        .or_else(|| non_empty_str(frame, "creator"))?;

    Some(NewTokenFrame {
        mint: mint.to_string(),
        name: non_empty_str(frame, "name").unwrap_or("Unknown").to_string(),
        symbol: non_empty_str(frame, "symbol").unwrap_or("???").to_string(),
        creator: creator.to_string(),
        uri: non_empty_str(frame, "uri").map(str::to_string),
    })
}

/// Trade frame; price is SOL per token, so both amounts must be positive
pub fn parse_trade(frame: &Value) -> Option<TradeFrame> {
    let mint = non_empty_str(frame, "mint")?;
    let sol_amount = frame.get("solAmount").and_then(Value::as_f64)?;
    let token_amount = frame.get("tokenAmount").and_then(Value::as_f64)?;

    if sol_amount <= 0.0 || token_amount <= 0.0 {
        return None;
    }

    Some(TradeFrame {
        mint: mint.to_string(),
        price: sol_amount / token_amount,
        market_cap_sol: frame.get("marketCapSol").and_then(Value::as_f64).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_payloads() {
        assert_eq!(subscribe_new_token().to_string(), r#"{"method":"subscribeNewToken"}"#);

        let msg = subscribe_token_trade(&["A".to_string(), "B".to_string()]);
        assert_eq!(msg["method"], "subscribeTokenTrade");
        assert_eq!(msg["keys"], json!(["A", "B"]));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&json!({"txType": "buy", "mint": "M"})), FrameKind::Trade);
        assert_eq!(classify(&json!({"txType": "sell"})), FrameKind::Trade);
        assert_eq!(classify(&json!({"txType": "create", "mint": "M"})), FrameKind::NewToken);
        assert_eq!(classify(&json!({"mint": "M"})), FrameKind::NewToken);
        assert_eq!(classify(&json!({"message": "Successfully subscribed"})), FrameKind::Other);
    }

    #[test]
    fn test_new_token_defaults() {
        let frame = json!({"mint": "M", "creator": "W"});
        let parsed = parse_new_token(&frame).unwrap();
        assert_eq!(parsed.name, "Unknown");
        assert_eq!(parsed.symbol, "???");
        assert_eq!(parsed.creator, "W");
        assert_eq!(parsed.uri, None);

        assert!(parse_new_token(&json!({"mint": "M"})).is_none());
    }

    #[test]
    fn test_trade_price() {
        let frame = json!({"txType": "buy", "mint": "M", "solAmount": 2.0, "tokenAmount": 4_000_000.0, "marketCapSol": 31.5});
        let parsed = parse_trade(&frame).unwrap();
        assert!((parsed.price - 0.0000005).abs() < 1e-15);
        assert_eq!(parsed.market_cap_sol, 31.5);

        assert!(parse_trade(&json!({"txType": "buy", "mint": "M", "solAmount": 0, "tokenAmount": 5})).is_none());
        assert!(parse_trade(&json!({"txType": "buy", "mint": "M", "solAmount": 1, "tokenAmount": 0})).is_none());
        assert!(parse_trade(&json!({"txType": "buy", "mint": "M", "solAmount": "1", "tokenAmount": 5})).is_none());
    }
}
