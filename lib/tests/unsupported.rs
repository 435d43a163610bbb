use ledger_keyring::{Error, Operation};

mod helpers;
use helpers::*;

#[tokio::test]
async fn unsupported_operations() -> anyhow::Result<()> {
    let expected = derive_accounts(MNEMONIC, 1).await;

    for accounts in [vec![], vec![expected[0].as_str()], vec![BAD_ACCOUNT]] {
        let (k, probe) = setup(&accounts);
        let a = accounts.first().copied().unwrap_or(BAD_ACCOUNT);

        let r = k.sign_message(a, "0xdeadbeef").await;
        assert!(matches!(r, Err(Error::Unsupported(Operation::SignMessage))));

        let typed = serde_json::json!({ "types": {}, "primaryType": "Mail" });
        let r = k.sign_typed_data(a, &typed).await;
        assert!(matches!(r, Err(Error::Unsupported(Operation::SignTypedData))));

        let r = k.export_account(a).await;
        assert!(matches!(r, Err(Error::Unsupported(Operation::ExportAccount))));

        // Rejected without touching the device
        assert!(probe.requests().is_empty());
    }

    Ok(())
}

#[tokio::test]
async fn unsupported_messages() {
    let e = Error::Unsupported(Operation::SignTypedData);
    assert!(e
        .to_string()
        .starts_with("signTypedData is not supported on this device"));
}
