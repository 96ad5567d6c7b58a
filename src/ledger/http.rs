use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::Address;

use super::{AccountKey, BlockHeader, LedgerError, LedgerGateway, Transaction, TransactionOutcome};

/// Gateway talking JSON to a ledger access node.
pub struct HttpLedgerGateway {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(default)]
    keys: Vec<AccountKey>,
}

#[derive(Deserialize)]
struct BlockResponse {
    header: BlockHeader,
}

impl HttpLedgerGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, LedgerError> {
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }

    async fn check_status(response: Response) -> Result<Response, LedgerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(LedgerError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn get_account_keys(&self, address: &Address) -> Result<Vec<AccountKey>, LedgerError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/accounts/{}", address)))
            .query(&[("expand", "keys")])
            .send()
            .await?;
        let account: AccountResponse = Self::read_json(response).await?;
        Ok(account.keys)
    }

    async fn get_latest_block_header(&self) -> Result<BlockHeader, LedgerError> {
        let response = self
            .client
            .get(self.url("/v1/blocks"))
            .query(&[("height", "sealed")])
            .send()
            .await?;
        let blocks: Vec<BlockResponse> = Self::read_json(response).await?;
        blocks
            .into_iter()
            .next()
            .map(|b| b.header)
            .ok_or_else(|| LedgerError::InvalidResponse("no sealed block returned".to_string()))
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        let response = self
            .client
            .post(self.url("/v1/transactions"))
            .json(transaction)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn get_transaction_outcome(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionOutcome, LedgerError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/transaction_results/{}", transaction_id)))
            .send()
            .await?;
        Self::read_json(response).await
    }
}
