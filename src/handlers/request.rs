use crate::models::{FundRequestInput, RequestKind, RequestStatus, StatusMessage};
use crate::services::SpinSession;
use crate::store::{AccountStore, RequestStore};

/// 提交充值申请
pub async fn deposit<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
    input: &FundRequestInput,
) -> StatusMessage {
    match session.submit_deposit(input).await {
        Ok(request) => {
            StatusMessage::success("✅ Payment request submitted! Await admin verification.")
                .with_data(&request)
        }
        Err(e) => e.into(),
    }
}

/// 提交提现申请
pub async fn withdraw<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
    input: &FundRequestInput,
) -> StatusMessage {
    match session.submit_withdrawal(input).await {
        Ok(request) => StatusMessage::success(format!(
            "✅ Withdraw request submitted for {} PKR.",
            request.amount
        ))
        .with_data(&request),
        Err(e) => e.into(),
    }
}

/// 查询自己的申请记录（倒序）
pub async fn history<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
    kind: RequestKind,
    status: Option<RequestStatus>,
) -> StatusMessage {
    match session.history(kind, status).await {
        Ok(list) => {
            StatusMessage::success(format!("{} {} request(s)", list.len(), kind.collection()))
                .with_data(&list)
        }
        Err(e) => e.into(),
    }
}
