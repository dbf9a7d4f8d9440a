//! Payment service - service payments debited from one account
//!
//! Uses the same atomic unit machinery as transfers. A payment can name the
//! account directly or present an RFID card, which is resolved to its
//! account inside the unit.

use std::sync::Arc;

use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::money::is_valid_amount;
use crate::domain::result::{Error, Result};
use crate::domain::{
    AuditAction, AuditEntry, CardPaymentRequest, EntityKind, PaymentError, PaymentOrder,
    PaymentRequest, RfidCard, ServicePayment,
};
use crate::ports::{LedgerStore, LedgerUnit};

/// Payment processor
pub struct PaymentService<S = DuckDbRepository> {
    store: Arc<S>,
}

/// Where the money comes from
enum Payer {
    Account(Uuid),
    Card(String),
}

impl<S: LedgerStore> PaymentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Pay a service from an account
    ///
    /// Checked in order: fields present, service type exists, account exists,
    /// positive amount, account active, enough funds.
    pub fn pay(&self, request: PaymentRequest) -> std::result::Result<ServicePayment, PaymentError> {
        let (account_id, order) = request.into_order().inspect_err(log_rejection)?;
        self.execute(Payer::Account(account_id), order)
    }

    /// Pay a service by presenting an RFID card
    ///
    /// The card must exist and be active before any other rule is checked.
    pub fn pay_with_card(
        &self,
        request: CardPaymentRequest,
    ) -> std::result::Result<ServicePayment, PaymentError> {
        let (card_number, order) = request.into_order().inspect_err(log_rejection)?;
        self.execute(Payer::Card(RfidCard::normalize_number(&card_number)), order)
    }

    fn execute(
        &self,
        payer: Payer,
        order: PaymentOrder,
    ) -> std::result::Result<ServicePayment, PaymentError> {
        let outcome = self
            .store
            .atomically(|unit| -> std::result::Result<ServicePayment, PaymentError> {
                let (account_id, card_id) = resolve_payer(unit, payer)?;

                if unit.find_service_type(order.service_type_id)?.is_none() {
                    return Err(PaymentError::ServiceTypeNotFound(order.service_type_id));
                }
                let account = unit
                    .find_account(account_id)?
                    .ok_or(PaymentError::AccountNotFound(account_id))?;
                if !is_valid_amount(order.amount) {
                    return Err(PaymentError::InvalidAmount);
                }
                if !account.active {
                    return Err(PaymentError::InactiveAccount(account.id));
                }
                if !account.can_cover(order.amount) {
                    return Err(PaymentError::InsufficientFunds {
                        account_id: account.id,
                        available: account.balance,
                        requested: order.amount,
                    });
                }

                let payment = order.into_payment(account.id, card_id);
                unit.apply_delta(account.id, -payment.amount)?;
                unit.insert_payment(&payment)?;
                unit.append_audit(&AuditEntry::new(
                    AuditAction::Create,
                    EntityKind::ServicePayment,
                    payment.id,
                    payment.authorizing_user_id,
                ))?;
                Ok(payment)
            });

        let payment = outcome.inspect_err(log_rejection)?;
        tracing::info!(
            payment_id = %payment.id,
            account = %payment.account_id,
            card = payment.card_id.is_some(),
            "payment committed"
        );
        Ok(payment)
    }
}

impl PaymentService<DuckDbRepository> {
    /// All payments, newest first
    pub fn list(&self) -> Result<Vec<ServicePayment>> {
        self.store.list_payments()
    }

    pub fn get(&self, id: Uuid) -> Result<ServicePayment> {
        self.store
            .get_payment(id)?
            .ok_or_else(|| Error::not_found(format!("payment {}", id)))
    }
}

fn resolve_payer(
    unit: &mut dyn LedgerUnit,
    payer: Payer,
) -> std::result::Result<(Uuid, Option<Uuid>), PaymentError> {
    match payer {
        Payer::Account(account_id) => Ok((account_id, None)),
        Payer::Card(card_number) => {
            let card = unit
                .find_card_by_number(&card_number)?
                .ok_or_else(|| PaymentError::CardNotFound(card_number.clone()))?;
            if !card.active {
                return Err(PaymentError::InactiveCard(card.card_number));
            }
            Ok((card.account_id, Some(card.id)))
        }
    }
}

fn log_rejection(err: &PaymentError) {
    if err.is_validation() {
        tracing::warn!(code = err.code(), "payment rejected: {}", err);
    } else {
        tracing::error!(code = err.code(), "payment failed: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use crate::domain::{Account, AccountType, Client, ServiceType};

    struct Fixture {
        _dir: TempDir,
        repo: Arc<DuckDbRepository>,
        service: PaymentService,
        account: Account,
        service_type: ServiceType,
        user: Uuid,
    }

    fn setup(balance: Decimal) -> Fixture {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(DuckDbRepository::new(&dir.path().join("test.duckdb")).unwrap());
        repo.ensure_schema().unwrap();

        let client = Client::new("Luis", "Perez");
        repo.insert_client(&client).unwrap();
        let account_type = AccountType::new("Checking", None);
        repo.insert_account_type(&account_type).unwrap();
        let account = Account::new("PAY-1", client.id, account_type.id, balance);
        repo.insert_account(&account).unwrap();
        let service_type = ServiceType::new("Electricity", None);
        repo.insert_service_type(&service_type).unwrap();

        Fixture {
            _dir: dir,
            service: PaymentService::new(Arc::clone(&repo)),
            repo,
            account,
            service_type,
            user: Uuid::new_v4(),
        }
    }

    fn request(f: &Fixture, amount: Decimal) -> PaymentRequest {
        PaymentRequest {
            paid_at: Some(Utc::now()),
            amount: Some(amount),
            account_id: Some(f.account.id),
            service_type_id: Some(f.service_type.id),
            authorizing_user_id: Some(f.user),
        }
    }

    fn card_request(f: &Fixture, card_number: &str, amount: Decimal) -> CardPaymentRequest {
        CardPaymentRequest {
            card_number: Some(card_number.to_string()),
            paid_at: Some(Utc::now()),
            amount: Some(amount),
            service_type_id: Some(f.service_type.id),
            authorizing_user_id: Some(f.user),
        }
    }

    fn balance(f: &Fixture) -> Decimal {
        f.repo.get_account(f.account.id).unwrap().unwrap().balance
    }

    fn assign_card(f: &Fixture, number: &str, active: bool) -> RfidCard {
        let mut card = RfidCard::new(number, f.account.id, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        card.active = active;
        f.repo.insert_card(&card).unwrap();
        card
    }

    #[test]
    fn test_payment_debits_once_and_audits() {
        let f = setup(Decimal::new(10000, 2));

        let payment = f.service.pay(request(&f, Decimal::new(4599, 2))).unwrap();

        assert_eq!(balance(&f), Decimal::new(5401, 2));
        assert_eq!(f.service.list().unwrap().len(), 1);
        assert_eq!(f.service.get(payment.id).unwrap().card_id, None);
        let audits = f.repo.list_audits(Some("ServicePayment"), None).unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].entity_id, payment.id);
    }

    #[test]
    fn test_unknown_service_type_checked_before_account() {
        let f = setup(Decimal::ONE);
        let mut req = request(&f, Decimal::ONE);
        let unknown = Uuid::new_v4();
        req.service_type_id = Some(unknown);
        req.account_id = Some(Uuid::new_v4());

        assert_eq!(f.service.pay(req).unwrap_err(), PaymentError::ServiceTypeNotFound(unknown));
    }

    #[test]
    fn test_insufficient_funds_leaves_balance() {
        let f = setup(Decimal::new(1000, 2));

        let err = f.service.pay(request(&f, Decimal::new(1001, 2))).unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(balance(&f), Decimal::new(1000, 2));
        assert!(f.service.list().unwrap().is_empty());
    }

    #[test]
    fn test_card_payment_resolves_account() {
        let f = setup(Decimal::new(50, 0));
        let card = assign_card(&f, "04A21B9C", true);

        let payment = f
            .service
            .pay_with_card(card_request(&f, "04:a2:1b:9c", Decimal::new(20, 0)))
            .unwrap();

        assert_eq!(payment.account_id, f.account.id);
        assert_eq!(payment.card_id, Some(card.id));
        assert_eq!(balance(&f), Decimal::new(30, 0));
    }

    #[test]
    fn test_inactive_card_cannot_pay() {
        let f = setup(Decimal::new(50, 0));
        assign_card(&f, "DEADBEEF", false);

        let err = f
            .service
            .pay_with_card(card_request(&f, "deadbeef", Decimal::new(20, 0)))
            .unwrap_err();

        assert_eq!(err, PaymentError::InactiveCard("DEADBEEF".to_string()));
        assert_eq!(balance(&f), Decimal::new(50, 0));
    }

    #[test]
    fn test_unknown_card() {
        let f = setup(Decimal::new(50, 0));
        let err = f
            .service
            .pay_with_card(card_request(&f, "CAFE0001", Decimal::ONE))
            .unwrap_err();
        assert_eq!(err, PaymentError::CardNotFound("CAFE0001".to_string()));
    }
}
