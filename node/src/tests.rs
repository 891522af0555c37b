use super::*;
use commonware_codec::Encode;
use nexus_types::{address, Kind};

fn config(yaml: &str) -> Config {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_defaults() {
    let validated = config("log_level: info").validate().unwrap();
    assert_eq!(validated.log_level, Level::INFO);
    assert!(!validated.json_logs);
    assert_eq!(validated.engine, EngineConfig::default());
    assert_eq!(validated.max_transactions, DEFAULT_MAX_TRANSACTIONS);
    assert!(validated.genesis_registers.is_empty());
}

#[test]
fn test_testnet_client() {
    let validated = config("log_level: debug\nnetwork: Testnet\nclient_mode: true\njson_logs: true")
        .validate()
        .unwrap();
    assert_eq!(validated.engine.network, Network::Testnet);
    assert!(validated.engine.client_mode);
    assert!(validated.json_logs);
}

#[test]
fn test_invalid_fields() {
    match config("log_level: loud").validate() {
        Err(ConfigError::InvalidLogLevel { value }) => assert_eq!(value, "loud"),
        other => panic!("expected invalid log level, got {:?}", other.err()),
    }
    match config("log_level: info\nnetwork: devnet").validate() {
        Err(ConfigError::InvalidNetwork { value }) => assert_eq!(value, "devnet"),
        other => panic!("expected invalid network, got {:?}", other.err()),
    }
    match config("log_level: info\nmax_transactions: 0").validate() {
        Err(ConfigError::InvalidNonZero { field, .. }) => assert_eq!(field, "max_transactions"),
        other => panic!("expected non-zero error, got {:?}", other.err()),
    }
}

#[test]
fn test_genesis_registers() {
    let address = Address::from_name("raw", address::RAW);
    let owner = Address::from_name("owner", address::RESERVED);
    let register = Register::new(Kind::Raw, owner, 7, b"seed".to_vec());
    let yaml = format!(
        "log_level: info\ngenesis_registers:\n  - address: \"{}\"\n    register: \"{}\"\n",
        hex(&address.encode()),
        hex(&register.encode())
    );
    let validated = config(&yaml).validate().unwrap();
    assert_eq!(validated.genesis_registers, vec![(address, register)]);

    let yaml = "log_level: info\ngenesis_registers:\n  - address: \"xyz\"\n    register: \"00\"\n";
    match config(yaml).validate() {
        Err(ConfigError::InvalidHex { field, .. }) => {
            assert_eq!(field, "genesis_registers.address")
        }
        other => panic!("expected invalid hex, got {:?}", other.err()),
    }

    let yaml = format!(
        "log_level: info\ngenesis_registers:\n  - address: \"{}\"\n    register: \"00\"\n",
        hex(&address.encode())
    );
    match config(&yaml).validate() {
        Err(ConfigError::InvalidDecode { field, .. }) => {
            assert_eq!(field, "genesis_registers.register")
        }
        other => panic!("expected decode error, got {:?}", other.err()),
    }
}
