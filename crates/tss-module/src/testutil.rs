//! In-memory chain for keeper tests, driving members through tss-core

use crate::context::BlockContext;
use crate::error::Result;
use crate::events::Event;
use crate::keeper::{Ctx, Executed, Keeper};
use crate::ledger::{Address, Amount, CacheLedger, InMemoryLedger, Ledger};
use crate::msg::{Command, Response};
use crate::params::Params;
use crate::query::{Query, QueryResponse, SigningResult};
use crate::types::{Group, GroupStatus, MemberStatus};
use chrono::{DateTime, Duration, Utc};
use rand::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use tss_core::de::{generate_des, De, DePrivate};
use tss_core::keygen::{DkgSession, Round1Info, Round2Info, Round3Message};
use tss_core::primitives::{keccak256, Point};
use tss_core::sign::create_partial_signature;
use tss_core::{GroupId, MemberId, MemberShare, SigningId};
use tss_store::{CacheStore, MemStore};

pub const GENESIS_TIMESTAMP: i64 = 1_700_000_000;
pub const DES_PER_MEMBER: usize = 5;

/// `member-1` .. `member-n`
pub fn addresses(n: usize) -> Vec<Address> {
    (1..=n).map(|i| Address::new(format!("member-{i}"))).collect()
}

/// Key shares and private DEs of an active group
pub struct Signers {
    pub group_id: GroupId,
    pub group_pub_key: Point,
    pub shares: Vec<MemberShare>,
    pub des: BTreeMap<Address, Vec<DePrivate>>,
}

pub struct TestChain {
    pub keeper: Keeper,
    pub store: MemStore,
    pub ledger: InMemoryLedger,
    pub block: BlockContext,
}

impl TestChain {
    pub fn new() -> Self {
        Self::with_params(Params::default())
    }

    pub fn with_params(params: Params) -> Self {
        let keeper = Keeper::new(Address::new("authority"));
        let mut store = MemStore::new();
        keeper.init_genesis(&mut store, &params).unwrap();
        let time = DateTime::<Utc>::from_timestamp(GENESIS_TIMESTAMP, 0).unwrap();
        Self {
            keeper,
            store,
            ledger: InMemoryLedger::new(),
            block: BlockContext::new(1, time, keccak256(&[b"genesis"])),
        }
    }

    pub fn authority(&self) -> Address {
        self.keeper.authority().clone()
    }

    pub fn exec(&mut self, command: Command) -> Result<Executed> {
        self.keeper
            .execute(&mut self.store, &mut self.ledger, &self.block, command)
    }

    pub fn end_block(&mut self) -> Vec<Event> {
        self.keeper
            .end_block(&mut self.store, &mut self.ledger, &self.block)
    }

    /// Move to the next block, `secs` later
    pub fn advance_secs(&mut self, secs: u64) {
        let height = self.block.height + 1;
        self.block = BlockContext::new(
            height,
            self.block.time + Duration::seconds(secs as i64),
            keccak256(&[&self.block.hash, &height.to_be_bytes()]),
        );
    }

    /// Run a keeper call against staged state, committing on success
    pub fn with_ctx<T>(&mut self, f: impl FnOnce(&Keeper, &mut Ctx<'_>) -> Result<T>) -> Result<T> {
        let mut cache = CacheStore::new(&mut self.store);
        let mut ledger = CacheLedger::new(&mut self.ledger);
        let value = {
            let mut ctx = Ctx {
                store: &mut cache,
                ledger: &mut ledger,
                block: &self.block,
                events: Vec::new(),
            };
            f(&self.keeper, &mut ctx)?
        };
        cache.commit();
        ledger.commit();
        Ok(value)
    }

    pub fn try_query(&self, query: Query) -> Result<QueryResponse> {
        self.keeper.query(&self.store, &self.ledger, query)
    }

    pub fn query(&self, query: Query) -> QueryResponse {
        self.try_query(query).unwrap()
    }

    pub fn params(&self) -> Params {
        self.keeper.params(&self.store).unwrap()
    }

    pub fn group(&self, group_id: GroupId) -> Group {
        self.keeper.must_get_group(&self.store, group_id).unwrap()
    }

    pub fn signing(&self, signing_id: SigningId) -> SigningResult {
        self.keeper.signing_result(&self.store, signing_id).unwrap()
    }

    pub fn current_group(&self) -> Option<GroupId> {
        self.keeper.current_group_id(&self.store).unwrap()
    }

    pub fn status(&self, address: &Address) -> Option<MemberStatus> {
        self.keeper.get_status(&self.store, address).unwrap()
    }

    pub fn de_count(&self, address: &Address) -> u64 {
        self.keeper.get_de_count(&self.store, address).unwrap()
    }

    pub fn poll_de(&mut self, address: &Address) -> Result<De> {
        self.with_ctx(|keeper, ctx| keeper.poll_de(ctx, address))
    }

    pub fn fund(&mut self, address: &Address, amount: Amount) {
        let balance = self.ledger.balance(address);
        self.ledger.set_balance(address, balance + amount);
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.ledger.balance(address)
    }

    pub fn activate(&mut self, address: &Address) {
        self.exec(Command::Activate {
            sender: address.clone(),
            address: address.clone(),
        })
        .unwrap();
    }

    pub fn jail(&mut self, address: &Address) {
        self.with_ctx(|keeper, ctx| keeper.jail(ctx, address)).unwrap();
    }

    pub fn create_group(&mut self, members: &[Address], threshold: u64, fee: Amount) -> GroupId {
        let executed = self
            .exec(Command::CreateGroup {
                authority: self.authority(),
                members: members.to_vec(),
                threshold,
                fee,
            })
            .unwrap();
        match executed.response {
            Response::GroupCreated { group_id } => group_id,
            other => panic!("unexpected response {other:?}"),
        }
    }

    pub fn submit_round1(&mut self, address: &Address, group_id: GroupId, round1: Round1Info) {
        self.exec(Command::SubmitDkgRound1 {
            sender: address.clone(),
            address: address.clone(),
            group_id,
            round1,
        })
        .unwrap();
    }

    pub fn submit_round2(&mut self, address: &Address, group_id: GroupId, round2: Round2Info) {
        self.exec(Command::SubmitDkgRound2 {
            sender: address.clone(),
            address: address.clone(),
            group_id,
            round2,
        })
        .unwrap();
    }

    /// Create a group and run an honest DKG to completion
    pub fn run_dkg<R: RngCore + CryptoRng>(
        &mut self,
        members: &[Address],
        threshold: u64,
        fee: Amount,
        rng: &mut R,
    ) -> (GroupId, Vec<MemberShare>) {
        let group_id = self.create_group(members, threshold, fee);
        let group = self.group(group_id);

        let mut sessions: Vec<DkgSession> = group
            .shape()
            .member_ids()
            .map(|id| DkgSession::new(group_id, id, group.shape(), group.dkg_context).unwrap())
            .collect();
        let round1s: Vec<Round1Info> = sessions.iter_mut().map(|s| s.round1(rng).unwrap()).collect();
        for (address, round1) in members.iter().zip(&round1s) {
            self.submit_round1(address, group_id, round1.clone());
        }
        let round2s: Vec<Round2Info> = sessions.iter().map(|s| s.round2(&round1s).unwrap()).collect();
        for (address, round2) in members.iter().zip(&round2s) {
            self.submit_round2(address, group_id, round2.clone());
        }

        let mut shares = Vec::with_capacity(members.len());
        for (session, address) in sessions.iter().zip(members) {
            let (share, message) = session.round3(&round1s, &round2s, rng).unwrap();
            let Round3Message::Confirm(confirm) = message else {
                panic!("honest DKG produced complaints");
            };
            self.exec(Command::Confirm {
                sender: address.clone(),
                address: address.clone(),
                group_id,
                confirm,
            })
            .unwrap();
            shares.push(share.unwrap());
        }
        assert_eq!(self.group(group_id).status, GroupStatus::Active);
        (group_id, shares)
    }

    /// Activate the members, run DKG and queue DEs for each of them
    pub fn setup_signers<R: RngCore + CryptoRng>(
        &mut self,
        members: &[Address],
        threshold: u64,
        fee: Amount,
        rng: &mut R,
    ) -> Signers {
        for address in members {
            if !self.status(address).is_some_and(|s| s.is_active) {
                self.activate(address);
            }
        }
        let (group_id, shares) = self.run_dkg(members, threshold, fee, rng);

        let mut des = BTreeMap::new();
        for address in members {
            let (privates, publics) = generate_des(DES_PER_MEMBER, rng);
            self.exec(Command::SubmitDes {
                sender: address.clone(),
                address: address.clone(),
                des: publics,
            })
            .unwrap();
            des.insert(address.clone(), privates);
        }

        Signers {
            group_id,
            group_pub_key: shares[0].group_pub_key,
            shares,
            des,
        }
    }

    /// Produce and submit `member_id`'s partial signature
    pub fn sign(&mut self, signers: &Signers, signing_id: SigningId, member_id: MemberId) -> Result<Executed> {
        let signing = self.signing(signing_id).signing;
        let assigned = signing.assigned(member_id).unwrap().clone();
        let share = signers
            .shares
            .iter()
            .find(|s| s.member_id == member_id)
            .unwrap();
        let committed = De {
            pub_d: assigned.pub_d,
            pub_e: assigned.pub_e,
        };
        let de = signers.des[&assigned.address]
            .iter()
            .find(|de| de.public() == committed)
            .unwrap();

        let partial = create_partial_signature(
            share,
            de,
            signing_id,
            &signing.content,
            &signing.commitments(),
        )
        .unwrap();
        self.exec(Command::SubmitSignature {
            sender: assigned.address.clone(),
            address: assigned.address,
            signing_id,
            member_id,
            signature: partial.z,
        })
    }
}
