use crate::error::{AppError, AppResult};
use crate::models::{AccountSnapshot, FundRequest, RequestKind, RequestStatus};
use crate::store::{AccountStore, RequestStore};

/// Admin-side decisions on fund requests.
///
/// Runs outside the player session and writes the account record
/// concurrently with it, the same way the hosted admin panel does.
#[derive(Clone)]
pub struct ApprovalService<S: AccountStore, R: RequestStore> {
    accounts: S,
    requests: R,
}

impl<S: AccountStore, R: RequestStore> ApprovalService<S, R> {
    pub fn new(accounts: S, requests: R) -> Self {
        Self { accounts, requests }
    }

    /// 批准申请：充值加余额，提现扣余额（余额不足则拒绝操作）
    pub async fn approve(&self, kind: RequestKind, request_id: &str) -> AppResult<FundRequest> {
        let mut request = self.pending_request(kind, request_id, RequestStatus::Approved).await?;

        let delta = match kind {
            RequestKind::Deposit => request.amount,
            RequestKind::Withdrawal => {
                let raw = self.accounts.get(&request.account_id).await?;
                let snapshot = AccountSnapshot::parse(raw.as_ref())?;
                let balance = snapshot.balance.unwrap_or(0);
                if balance < request.amount {
                    return Err(AppError::ValidationError(format!(
                        "Account balance {balance} is below the requested {}",
                        request.amount
                    )));
                }
                -request.amount
            }
        };

        let balance = self
            .accounts
            .increment(&request.account_id, "balance", delta)
            .await?;
        self.requests
            .set_status(kind, request_id, RequestStatus::Approved)
            .await?;
        request.status = RequestStatus::Approved;

        log::info!(
            "Approved {} request {request_id} for {}; balance now {balance}",
            kind.collection(),
            request.account_id
        );
        Ok(request)
    }

    pub async fn reject(&self, kind: RequestKind, request_id: &str) -> AppResult<FundRequest> {
        let mut request = self.pending_request(kind, request_id, RequestStatus::Rejected).await?;
        self.requests
            .set_status(kind, request_id, RequestStatus::Rejected)
            .await?;
        request.status = RequestStatus::Rejected;
        log::info!("Rejected {} request {request_id}", kind.collection());
        Ok(request)
    }

    async fn pending_request(
        &self,
        kind: RequestKind,
        request_id: &str,
        target: RequestStatus,
    ) -> AppResult<FundRequest> {
        let request = self
            .requests
            .find(kind, request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} request {request_id}", kind.collection())))?;
        if request.status != RequestStatus::Pending {
            return Err(AppError::InvalidTransition {
                from: request.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(request)
    }
}
