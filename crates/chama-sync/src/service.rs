// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::sync::Arc;

use chama_core::ports::{ClockPort, RandomPort, SystemClock, SystemRandom};
use chama_core::{
    check_redeemable, reconcile_status, resolve_access, AccessLevel, AccessSnapshot,
    ChainObservation, DisplayStatus, ErrorCode, InviteCode, InviteError, InviteIssuer,
    InviteTarget, OnChainSnapshot, ReconciledStatus, RoundLedger,
};
use chama_model::{
    Chama, ChamaId, ChamaStatus, DepositStatus, EvmAddress, Invite, Member, ValidationError,
    DEFAULT_GRACE_PERIOD_SECS, MIN_MEMBERS,
};
use chama_store::{
    ChainClient, ChainError, ChainErrorCode, ChamaPage, ChamaQuery, RecordStore,
    RegistrationRequest, StoreError, StoreErrorCode,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::refresh::{RefreshCoalescer, RefreshGate, RefreshOutcome, RefreshTicket};
use crate::state::{load_state, save_state, CachedStatus, ClientState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChama {
    pub id: ChamaId,
    pub name: String,
    pub contribution_amount: u128,
    #[serde(default)]
    pub deposit_amount: u128,
    pub cycle_duration_secs: u64,
    #[serde(default)]
    pub grace_period_secs: Option<u64>,
    pub max_members: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub invite: Invite,
    /// Set when the code was scoped to a chama and the redeemer joined it.
    pub membership: Option<Member>,
}

struct Session {
    gate: RefreshGate,
    state: ClientState,
}

fn invalid_transition(err: ValidationError) -> SyncError {
    SyncError::new(ErrorCode::InvalidTransition, err.0)
}

fn addresses(members: &[Member]) -> Vec<EvmAddress> {
    members.iter().map(|m| m.address.clone()).collect()
}

/// Client-side orchestration of the chama lifecycle over a record store and
/// a chain client.
pub struct ChamaService<S, C> {
    store: Arc<S>,
    chain: Arc<C>,
    config: SyncConfig,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
    coalescer: RefreshCoalescer,
    session: Mutex<Session>,
}

impl<S: RecordStore, C: ChainClient> ChamaService<S, C> {
    #[must_use]
    pub fn new(store: Arc<S>, chain: Arc<C>, config: SyncConfig) -> Self {
        Self {
            store,
            chain,
            config,
            clock: Arc::new(SystemClock),
            random: Arc::new(SystemRandom),
            coalescer: RefreshCoalescer::new(),
            session: Mutex::new(Session {
                gate: RefreshGate::default(),
                state: ClientState::default(),
            }),
        }
    }

    /// Like `new`, restoring the client state persisted at `config.state_path`.
    pub fn open(store: Arc<S>, chain: Arc<C>, config: SyncConfig) -> Result<Self, SyncError> {
        let state = load_state(&config.state_path)?;
        Ok(Self::new(store, chain, config).with_state(state))
    }

    #[must_use]
    pub fn with_ports(mut self, clock: Arc<dyn ClockPort>, random: Arc<dyn RandomPort>) -> Self {
        self.clock = clock;
        self.random = random;
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: ClientState) -> Self {
        self.session = Mutex::new(Session {
            gate: RefreshGate::default(),
            state,
        });
        self
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn client_state(&self) -> ClientState {
        self.session.lock().await.state.clone()
    }

    pub async fn set_viewer(&self, viewer: Option<EvmAddress>) {
        self.session.lock().await.state.viewer = viewer;
    }

    pub async fn persist(&self) -> Result<(), SyncError> {
        let session = self.session.lock().await;
        save_state(&self.config.state_path, &session.state)?;
        tracing::debug!(path = %self.config.state_path.display(), "client state saved");
        Ok(())
    }

    pub async fn list_chamas(&self, query: &ChamaQuery) -> Result<ChamaPage, SyncError> {
        Ok(self
            .config
            .retry
            .run("list_chamas", StoreError::is_retryable, || {
                self.store.list_chamas(query)
            })
            .await?)
    }

    pub async fn create_chama(
        &self,
        new: NewChama,
        creator: &EvmAddress,
        display_name: &str,
    ) -> Result<Chama, SyncError> {
        let now = self.clock.now_unix();
        let chama = Chama {
            id: new.id,
            name: new.name.trim().to_string(),
            contribution_amount: new.contribution_amount,
            deposit_amount: new.deposit_amount,
            cycle_duration_secs: new.cycle_duration_secs,
            grace_period_secs: new.grace_period_secs.unwrap_or(DEFAULT_GRACE_PERIOD_SECS),
            max_members: new.max_members,
            status: ChamaStatus::Draft,
            onchain_address: None,
            creator: creator.clone(),
            created_at: now,
        };
        chama.validate()?;
        let founder = Member::joined(
            chama.id.clone(),
            creator.clone(),
            display_name,
            chama.requires_deposit(),
            now,
        );
        founder.validate(chama.requires_deposit())?;

        self.store.insert_chama(chama.clone()).await?;
        self.store.insert_member(founder, chama.max_members).await?;
        self.record_local_status(&chama).await;
        tracing::info!(chama = %chama.id, creator = %creator, "chama created");
        Ok(chama)
    }

    pub async fn open_recruiting(
        &self,
        id: &ChamaId,
        actor: &EvmAddress,
    ) -> Result<Chama, SyncError> {
        let chama = self.load_chama(id).await?;
        require_creator(&chama, actor)?;
        self.move_to(chama, ChamaStatus::Recruiting).await
    }

    pub async fn cancel_chama(&self, id: &ChamaId, actor: &EvmAddress) -> Result<Chama, SyncError> {
        let chama = self.load_chama(id).await?;
        require_creator(&chama, actor)?;
        self.move_to(chama, ChamaStatus::Cancelled).await
    }

    pub async fn join_chama(
        &self,
        id: &ChamaId,
        member: &EvmAddress,
        display_name: &str,
    ) -> Result<Member, SyncError> {
        let chama = self.load_chama(id).await?;
        let members = self.load_members(id).await?;
        ensure_can_join(&chama, &members, member)?;

        let row = Member::joined(
            id.clone(),
            member.clone(),
            display_name,
            chama.requires_deposit(),
            self.clock.now_unix(),
        );
        row.validate(chama.requires_deposit())?;
        let count = self
            .store
            .insert_member(row.clone(), chama.max_members)
            .await
            .map_err(|err| match err.code {
                StoreErrorCode::AlreadyExists => SyncError::new(ErrorCode::AlreadyMember, err.message),
                _ => SyncError::from(err),
            })?;
        tracing::info!(chama = %id, member = %member, count, "member joined");

        if count >= chama.max_members {
            self.settle_status(chama, ChamaStatus::Waiting).await?;
        }
        Ok(row)
    }

    pub async fn leave_chama(&self, id: &ChamaId, member: &EvmAddress) -> Result<(), SyncError> {
        let chama = self.load_chama(id).await?;
        if &chama.creator == member {
            return Err(SyncError::new(
                ErrorCode::Unauthorized,
                "the creator cannot leave; cancel the chama instead",
            ));
        }
        if !matches!(
            chama.status,
            ChamaStatus::Draft | ChamaStatus::Recruiting | ChamaStatus::Waiting
        ) {
            return Err(SyncError::new(
                ErrorCode::InvalidTransition,
                format!("members cannot leave a {} chama", chama.status),
            ));
        }
        self.store
            .remove_member(id, member)
            .await
            .map_err(|err| match err.code {
                StoreErrorCode::NotFound => SyncError::new(
                    ErrorCode::NotMember,
                    format!("{member} is not a member of {id}"),
                ),
                _ => SyncError::from(err),
            })?;
        tracing::info!(chama = %id, member = %member, "member left");

        if chama.status == ChamaStatus::Waiting {
            self.settle_status(chama, ChamaStatus::Recruiting).await?;
        }
        Ok(())
    }

    /// Marks a member's deposit as staked before the chama goes on chain.
    pub async fn record_deposit(
        &self,
        id: &ChamaId,
        member: &EvmAddress,
    ) -> Result<Member, SyncError> {
        let chama = self.load_chama(id).await?;
        if !chama.requires_deposit() {
            return Err(SyncError::new(
                ErrorCode::InvalidTransition,
                format!("chama {id} takes no deposit"),
            ));
        }
        if chama.is_on_chain() || chama.status.is_terminal() {
            return Err(SyncError::new(
                ErrorCode::InvalidTransition,
                format!("deposits cannot be recorded for a {} chama", chama.status),
            ));
        }
        let members = self.load_members(id).await?;
        let mut row = members
            .into_iter()
            .find(|m| &m.address == member)
            .ok_or_else(|| {
                SyncError::new(
                    ErrorCode::NotMember,
                    format!("{member} is not a member of {id}"),
                )
            })?;
        row.mark_deposit_paid().map_err(invalid_transition)?;
        row.validate(true)?;
        self.store.upsert_member(row.clone()).await?;
        tracing::info!(
            chama = %id,
            member = %member,
            amount = chama.deposit_amount,
            "deposit recorded"
        );
        Ok(row)
    }

    /// Registers the chama on chain and records the contract address.
    ///
    /// A failed or unconfirmed transaction leaves the record untouched.
    pub async fn deploy_chama(&self, id: &ChamaId, actor: &EvmAddress) -> Result<Chama, SyncError> {
        let chama = self.load_chama(id).await?;
        require_creator(&chama, actor)?;
        let view = reconcile_status(&chama, &ChainObservation::NotQueried);
        if !view.deployable {
            return Err(SyncError::new(
                ErrorCode::InvalidTransition,
                format!(
                    "chama {id} is {}; only recruiting or waiting chamas can be deployed",
                    chama.status
                ),
            ));
        }
        let members = self.load_members(id).await?;
        if members.len() < MIN_MEMBERS as usize {
            return Err(SyncError::new(
                ErrorCode::InsufficientMembers,
                format!(
                    "chama {id} has {} members; at least {MIN_MEMBERS} are required",
                    members.len()
                ),
            ));
        }
        if chama.requires_deposit() {
            let unpaid: Vec<String> = members
                .iter()
                .filter(|m| m.deposit_status != DepositStatus::Paid)
                .map(|m| m.address.to_string())
                .collect();
            if !unpaid.is_empty() {
                return Err(SyncError::new(
                    ErrorCode::DepositPending,
                    format!("chama {id} has unpaid deposits: {}", unpaid.join(", ")),
                ));
            }
        }

        let request = RegistrationRequest::for_chama(&chama, addresses(&members));
        self.check_balance(&chama.creator, request.required_balance())
            .await?;

        let tx = self
            .chain
            .submit_registration(&request)
            .await
            .map_err(|err| {
                tracing::error!(chama = %id, error = %err, "registration submission failed");
                SyncError::transaction_failed(format!("registration not submitted: {err}"))
            })?;
        let receipt = self
            .chain
            .wait_for_receipt(&tx, self.config.receipt_timeout)
            .await
            .map_err(|err| {
                tracing::error!(chama = %id, tx = %tx, error = %err, "registration not confirmed");
                SyncError::transaction_failed(format!("registration {tx} not confirmed: {err}"))
            })?;
        let contract = match (receipt.success, receipt.contract_address) {
            (true, Some(contract)) if !contract.is_zero() => contract,
            _ => {
                tracing::error!(chama = %id, tx = %tx, "registration reverted");
                return Err(SyncError::transaction_failed(format!(
                    "registration {tx} reverted"
                )));
            }
        };

        let expected = chama.status;
        let mut registered = chama;
        registered
            .transition(ChamaStatus::Registered, Some(contract.clone()))
            .map_err(invalid_transition)?;
        if let Err(err) = self.store.update_chama(registered.clone(), expected).await {
            tracing::error!(
                chama = %id,
                contract = %contract,
                error = %err,
                "contract deployed but record update failed"
            );
            return Err(SyncError::new(
                ErrorCode::NeedsResync,
                format!("contract {contract} deployed but record was not updated: {err}"),
            ));
        }
        self.record_local_status(&registered).await;
        tracing::info!(chama = %id, contract = %contract, tx = %tx, "chama registered on chain");
        Ok(registered)
    }

    pub async fn begin_refresh(&self) -> RefreshTicket {
        self.session.lock().await.gate.issue()
    }

    pub async fn refresh_status(&self, id: &ChamaId) -> Result<RefreshOutcome, SyncError> {
        let ticket = self.begin_refresh().await;
        self.refresh_status_with(id, ticket).await
    }

    /// Reads the record and the chain, reconciles, and caches the result
    /// unless a write newer than `ticket` already landed. A discarded
    /// response never touches the record.
    pub async fn refresh_status_with(
        &self,
        id: &ChamaId,
        ticket: RefreshTicket,
    ) -> Result<RefreshOutcome, SyncError> {
        let _inflight = self.coalescer.acquire(id).await;
        let chama = self.load_chama(id).await?;
        let observation = match &chama.onchain_address {
            None => ChainObservation::NotQueried,
            Some(address) => self.observe_chain(id, address).await,
        };
        let reconciled = reconcile_status(&chama, &observation);
        if let DisplayStatus::NeedsResync { reason } = &reconciled.display {
            tracing::warn!(chama = %id, reason = %reason, "off-chain and on-chain records disagree");
        }

        let now = self.clock.now_unix();
        {
            let mut session = self.session.lock().await;
            if let Err(latest) = session.gate.admit(id, ticket) {
                tracing::debug!(
                    chama = %id,
                    ticket = ticket.value(),
                    superseded_by = latest.value(),
                    "discarding stale status response"
                );
                return Ok(RefreshOutcome::Discarded {
                    ticket,
                    superseded_by: latest,
                });
            }
            cache_view(&mut session.state, id, &reconciled, now);
            session.state.last_viewed_chama = Some(id.clone());
        }
        if reconciled.offchain_behind {
            if let Some(target) = reconciled.display.status() {
                self.write_back(chama, target).await;
            }
        }
        Ok(RefreshOutcome::Applied(reconciled))
    }

    pub async fn access_for(
        &self,
        id: &ChamaId,
        viewer: Option<&EvmAddress>,
    ) -> Result<AccessLevel, SyncError> {
        let chama = self.load_chama(id).await?;
        let members = self.load_members(id).await?;
        let snapshot = AccessSnapshot::from_chama(&chama, addresses(&members));
        Ok(resolve_access(viewer, &snapshot))
    }

    pub async fn issue_invite(
        &self,
        inviter: &EvmAddress,
        chama: Option<&ChamaId>,
        max_uses: Option<u32>,
    ) -> Result<Invite, SyncError> {
        if let Some(id) = chama {
            let record = self.load_chama(id).await?;
            if record.status.is_terminal() {
                return Err(SyncError::new(
                    ErrorCode::InvalidTransition,
                    format!("chama {id} is {}", record.status),
                ));
            }
            let members = self.load_members(id).await?;
            let snapshot = AccessSnapshot::from_chama(&record, addresses(&members));
            if !resolve_access(Some(inviter), &snapshot).can_contribute() {
                return Err(SyncError::new(
                    ErrorCode::Unauthorized,
                    format!("{inviter} cannot invite to {id}"),
                ));
            }
        }
        let issuer = InviteIssuer::new(self.clock.as_ref(), self.random.as_ref());
        let invite = issuer.issue(
            inviter,
            chama,
            Some(max_uses.unwrap_or(self.config.invite_max_uses)),
        )?;
        self.store.insert_invite(invite.clone()).await?;
        tracing::info!(
            code = %invite.code,
            inviter = %inviter,
            max_uses = invite.max_uses,
            "invite issued"
        );
        Ok(invite)
    }

    /// Keeps a code opened before a wallet was connected.
    pub async fn remember_pending_invite(&self, code: &str) -> Result<(), SyncError> {
        let parsed = InviteCode::parse(code)?;
        self.session.lock().await.state.pending_invite = Some(parsed.to_string());
        Ok(())
    }

    pub async fn redeem_invite(
        &self,
        code: &str,
        redeemer: &EvmAddress,
        display_name: &str,
    ) -> Result<Redemption, SyncError> {
        let parsed = InviteCode::parse(code)?;
        let stored = self
            .store
            .get_invite(code)
            .await
            .map_err(|err| match err.code {
                StoreErrorCode::NotFound => SyncError::from(InviteError::NotFound),
                _ => SyncError::from(err),
            })?;
        let matches_record = parsed.issued_by(&stored.inviter)
            && match &stored.chama_id {
                Some(id) => parsed.targets_chama(id),
                None => parsed.target == InviteTarget::Platform,
            };
        if !matches_record {
            return Err(SyncError::from(InviteError::Malformed {
                reason: "code does not match its invite record".to_string(),
            }));
        }
        let now = self.clock.now_unix();
        check_redeemable(&stored, redeemer, now)?;
        if let Some(id) = &stored.chama_id {
            let chama = self.load_chama(id).await?;
            let members = self.load_members(id).await?;
            ensure_can_join(&chama, &members, redeemer)?;
        }

        let invite = self.store.redeem_invite(code, redeemer, now).await?;
        tracing::info!(
            code = %invite.code,
            redeemer = %redeemer,
            uses = invite.current_uses,
            remaining = invite.remaining_uses(),
            "invite redeemed"
        );
        let membership = match &invite.chama_id {
            Some(id) => match self.join_chama(id, redeemer, display_name).await {
                Ok(member) => Some(member),
                Err(err) => {
                    self.release_use(&invite.code, id, &err).await;
                    return Err(err);
                }
            },
            None => None,
        };

        let mut session = self.session.lock().await;
        if session.state.pending_invite.as_deref() == Some(invite.code.as_str()) {
            session.state.pending_invite = None;
        }
        Ok(Redemption { invite, membership })
    }

    /// Stops a code from being redeemed; only its inviter may do this.
    pub async fn deactivate_invite(&self, code: &str, actor: &EvmAddress) -> Result<(), SyncError> {
        let stored = self
            .store
            .get_invite(code)
            .await
            .map_err(|err| match err.code {
                StoreErrorCode::NotFound => SyncError::from(InviteError::NotFound),
                _ => SyncError::from(err),
            })?;
        if &stored.inviter != actor {
            return Err(SyncError::new(
                ErrorCode::Unauthorized,
                format!("only the inviter may deactivate {}", stored.code),
            ));
        }
        self.store.deactivate_invite(code).await?;
        let mut session = self.session.lock().await;
        if session.state.pending_invite.as_deref() == Some(stored.code.as_str()) {
            session.state.pending_invite = None;
        }
        tracing::info!(code = %stored.code, inviter = %actor, "invite deactivated");
        Ok(())
    }

    pub async fn round_report(&self, id: &ChamaId, now: Option<u64>) -> Result<RoundLedger, SyncError> {
        let chama = self.load_chama(id).await?;
        let Some(address) = chama.onchain_address.clone() else {
            return Err(SyncError::new(
                ErrorCode::InvalidTransition,
                format!("chama {id} is not on chain yet"),
            ));
        };
        let rounds = self
            .config
            .retry
            .run("read_rounds", ChainError::is_retryable, || {
                self.bounded("read_rounds", self.chain.read_rounds(&address))
            })
            .await?;
        let members = self.load_members(id).await?;
        RoundLedger::build(
            &chama,
            &members,
            &rounds,
            now.unwrap_or_else(|| self.clock.now_unix()),
            &self.config.reliability,
        )
        .map_err(|err| SyncError::new(ErrorCode::NeedsResync, err.0))
    }

    async fn load_chama(&self, id: &ChamaId) -> Result<Chama, SyncError> {
        Ok(self
            .config
            .retry
            .run("get_chama", StoreError::is_retryable, || {
                self.store.get_chama(id)
            })
            .await?)
    }

    async fn load_members(&self, id: &ChamaId) -> Result<Vec<Member>, SyncError> {
        Ok(self
            .config
            .retry
            .run("list_members", StoreError::is_retryable, || {
                self.store.list_members(id)
            })
            .await?)
    }

    async fn bounded<T>(
        &self,
        label: &'static str,
        call: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        let limit = self.config.rpc_timeout;
        tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(ChainError::new(
                ChainErrorCode::Timeout,
                format!("{label} exceeded {}ms", limit.as_millis()),
            ))
        })
    }

    async fn read_snapshot(&self, address: &EvmAddress) -> Result<OnChainSnapshot, ChainError> {
        self.config
            .retry
            .run("read_chama", ChainError::is_retryable, || {
                self.bounded("read_chama", self.chain.read_chama(address))
            })
            .await
    }

    async fn observe_chain(&self, id: &ChamaId, address: &EvmAddress) -> ChainObservation {
        match self.read_snapshot(address).await {
            Ok(snapshot) => ChainObservation::Fetched(snapshot),
            Err(err) if err.code == ChainErrorCode::NotDeployed => ChainObservation::Missing {
                reason: err.to_string(),
            },
            Err(err) => {
                tracing::warn!(chama = %id, error = %err, "chain read failed; showing last known status");
                ChainObservation::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Gives back the use taken for a scoped redemption whose join failed.
    async fn release_use(&self, code: &str, id: &ChamaId, cause: &SyncError) {
        match self.store.release_invite_use(code).await {
            Ok(invite) => tracing::warn!(
                code = %invite.code,
                chama = %id,
                error = %cause,
                remaining = invite.remaining_uses(),
                "join failed; invite use released"
            ),
            Err(err) => tracing::error!(
                code = %code,
                chama = %id,
                error = %cause,
                release_error = %err,
                "join failed and invite use could not be released"
            ),
        }
    }

    /// Balance trouble never blocks; only a confirmed shortfall does.
    async fn check_balance(&self, account: &EvmAddress, required: u128) -> Result<(), SyncError> {
        match self
            .bounded("balance_of", self.chain.balance_of(account))
            .await
        {
            Ok(balance) if balance < required => Err(SyncError::new(
                ErrorCode::InsufficientBalance,
                format!("{account} holds {balance}, needs {required}"),
            )),
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    account = %account,
                    error = %err,
                    "balance check unavailable; proceeding"
                );
                Ok(())
            }
        }
    }

    /// Brings the record forward to the chain-derived status.
    async fn write_back(&self, chama: Chama, target: ChamaStatus) {
        let id = chama.id.clone();
        let expected = chama.status;
        let mut next = chama;
        while next.status != target {
            let step = match next.status {
                ChamaStatus::Registered => ChamaStatus::Active,
                ChamaStatus::Active => ChamaStatus::Completed,
                other => {
                    tracing::warn!(chama = %id, from = %other, to = %target, "no forward path to chain status");
                    return;
                }
            };
            if let Err(err) = next.transition(step, None) {
                tracing::warn!(chama = %id, error = %err, "chain status write-back rejected");
                return;
            }
        }
        match self.store.update_chama(next, expected).await {
            Ok(()) => tracing::info!(chama = %id, from = %expected, to = %target, "record caught up with chain"),
            Err(err) => tracing::warn!(chama = %id, error = %err, "chain status write-back failed"),
        }
    }

    async fn move_to(&self, chama: Chama, next: ChamaStatus) -> Result<Chama, SyncError> {
        let expected = chama.status;
        let mut updated = chama;
        updated.transition(next, None).map_err(invalid_transition)?;
        self.store.update_chama(updated.clone(), expected).await?;
        self.record_local_status(&updated).await;
        tracing::info!(chama = %updated.id, from = %expected, to = %next, "chama status changed");
        Ok(updated)
    }

    /// Membership-driven transition; losing the race to a writer that
    /// already reached `target` is fine.
    async fn settle_status(&self, chama: Chama, target: ChamaStatus) -> Result<(), SyncError> {
        let id = chama.id.clone();
        match self.move_to(chama, target).await {
            Ok(_) => Ok(()),
            Err(err) if err.code == ErrorCode::Conflict => {
                let current = self.load_chama(&id).await?;
                if current.status == target {
                    Ok(())
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn record_local_status(&self, chama: &Chama) {
        let now = self.clock.now_unix();
        let mut session = self.session.lock().await;
        let ticket = session.gate.issue();
        let _ = session.gate.admit(&chama.id, ticket);
        session.state.cached_status.insert(
            chama.id.clone(),
            CachedStatus {
                status: chama.status,
                on_chain: chama.is_on_chain(),
                fetched_at: now,
                stale: false,
            },
        );
    }
}

fn require_creator(chama: &Chama, actor: &EvmAddress) -> Result<(), SyncError> {
    if &chama.creator != actor {
        return Err(SyncError::new(
            ErrorCode::Unauthorized,
            format!("only the creator of {} may do this", chama.id),
        ));
    }
    Ok(())
}

fn ensure_can_join(chama: &Chama, members: &[Member], who: &EvmAddress) -> Result<(), SyncError> {
    let snapshot = AccessSnapshot::from_chama(chama, addresses(members));
    match resolve_access(Some(who), &snapshot) {
        AccessLevel::CanJoin => Ok(()),
        AccessLevel::Creator | AccessLevel::Member => Err(SyncError::new(
            ErrorCode::AlreadyMember,
            format!("{who} already belongs to {}", chama.id),
        )),
        AccessLevel::Guest | AccessLevel::Viewer if chama.status.accepts_members() => {
            Err(SyncError::new(
                ErrorCode::ChamaFull,
                format!("chama {} has no open slots", chama.id),
            ))
        }
        AccessLevel::Guest | AccessLevel::Viewer => Err(SyncError::new(
            ErrorCode::InvalidTransition,
            format!("chama {} is {} and not accepting members", chama.id, chama.status),
        )),
    }
}

fn cache_view(state: &mut ClientState, id: &ChamaId, view: &ReconciledStatus, now: u64) {
    match view.display.status() {
        Some(status) => {
            state.cached_status.insert(
                id.clone(),
                CachedStatus {
                    status,
                    on_chain: view.on_chain,
                    fetched_at: now,
                    stale: matches!(view.display, DisplayStatus::Stale { .. }),
                },
            );
        }
        None => {
            state.cached_status.remove(id);
        }
    }
}
