//! TSS Member CLI
//!
//! Command-line interface for a group member:
//! - Pre-commit DE nonce pairs
//! - Drive the three DKG rounds of a group
//! - Produce partial signatures for assigned signings
//! - Keep the member active and manage grants

mod keystore;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use keystore::Keystore;
use rand::rngs::OsRng;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tss_client::NodeClient;
use tss_core::de::{generate_des, De};
use tss_core::keygen::{DkgSession, Round3Message};
use tss_core::sign::create_partial_signature;
use tss_core::{GroupId, MemberId, SigningId};
use tss_module::query::{GroupResult, SigningResult};
use tss_module::types::GroupStatus;
use tss_module::{Address, Command, Query, QueryResponse};

/// TSS Member - threshold signing group member
#[derive(Parser)]
#[command(name = "tss-member")]
#[command(about = "Threshold Schnorr group member")]
#[command(version)]
struct Cli {
    /// Node URL
    #[arg(short, long, env = "TSS_NODE_URL", default_value = "http://127.0.0.1:8080")]
    node: String,

    /// Member address this CLI acts for
    #[arg(short, long, env = "TSS_ADDRESS")]
    address: String,

    /// Transaction sender, when acting through a grant
    #[arg(long, env = "TSS_SENDER")]
    sender: Option<String>,

    /// Data directory for DEs, DKG sessions and key shares
    #[arg(short, long, env = "DEST", default_value = "./data")]
    dest: PathBuf,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and submit fresh DE pairs
    De {
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },

    /// Submit DKG round 1
    Round1 {
        #[arg(short, long)]
        group_id: GroupId,
    },

    /// Submit DKG round 2
    Round2 {
        #[arg(short, long)]
        group_id: GroupId,
    },

    /// Check received shares and confirm or complain
    Round3 {
        #[arg(short, long)]
        group_id: GroupId,
    },

    /// Submit this member's partial signature
    Sign {
        #[arg(short, long)]
        signing_id: SigningId,
    },

    /// Activate the member address
    Activate,

    /// Refresh the liveness timestamp
    HealthCheck,

    /// Allow another address to submit on this member's behalf
    Grant {
        #[arg(long)]
        grantee: String,
    },

    /// Revoke a grant
    Revoke {
        #[arg(long)]
        grantee: String,
    },

    /// Show member status and local state
    Info,
}

struct Member {
    client: NodeClient,
    address: Address,
    sender: Address,
    keystore: Keystore,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let address = Address::new(&cli.address);
    let member = Member {
        client: NodeClient::new(&cli.node),
        sender: cli.sender.as_deref().map(Address::new).unwrap_or_else(|| address.clone()),
        address,
        keystore: Keystore::open(&cli.dest)?,
    };

    match cli.command {
        Commands::De { count } => member.submit_des(count).await,
        Commands::Round1 { group_id } => member.round1(group_id).await,
        Commands::Round2 { group_id } => member.round2(group_id).await,
        Commands::Round3 { group_id } => member.round3(group_id).await,
        Commands::Sign { signing_id } => member.sign(signing_id).await,
        Commands::Activate => {
            member
                .execute(Command::Activate {
                    sender: member.sender.clone(),
                    address: member.address.clone(),
                })
                .await
        }
        Commands::HealthCheck => {
            member
                .execute(Command::HealthCheck {
                    sender: member.sender.clone(),
                    address: member.address.clone(),
                })
                .await
        }
        Commands::Grant { grantee } => {
            member
                .execute(Command::Grant {
                    granter: member.address.clone(),
                    grantee: Address::new(&grantee),
                })
                .await
        }
        Commands::Revoke { grantee } => {
            member
                .execute(Command::Revoke {
                    granter: member.address.clone(),
                    grantee: Address::new(&grantee),
                })
                .await
        }
        Commands::Info => member.show_info().await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

impl Member {
    async fn execute(&self, command: Command) -> Result<()> {
        let name = command.name();
        let response = self.client.execute(&command).await?;
        info!(command = name, ?response, "committed");
        Ok(())
    }

    async fn group(&self, group_id: GroupId) -> Result<GroupResult> {
        match self.client.query(&Query::Group { group_id }).await? {
            QueryResponse::Group(group) => Ok(*group),
            other => Err(anyhow!("unexpected response {other:?}")),
        }
    }

    async fn signing(&self, signing_id: SigningId) -> Result<SigningResult> {
        match self.client.query(&Query::Signing { signing_id }).await? {
            QueryResponse::Signing(signing) => Ok(*signing),
            other => Err(anyhow!("unexpected response {other:?}")),
        }
    }

    fn member_id(&self, group: &GroupResult) -> Result<MemberId> {
        group
            .members
            .iter()
            .find(|m| m.member.address == self.address)
            .map(|m| m.member.id)
            .ok_or_else(|| anyhow!("{} is not a member of group {}", self.address, group.group.id))
    }

    fn expect_status(group: &GroupResult, status: GroupStatus) -> Result<()> {
        if group.group.status != status {
            bail!(
                "group {} is in {:?}, expected {:?}",
                group.group.id,
                group.group.status,
                status
            );
        }
        Ok(())
    }

    /// Private halves are stored only after the node accepts the batch
    async fn submit_des(&self, count: usize) -> Result<()> {
        let (privates, publics) = generate_des(count, &mut OsRng);
        self.execute(Command::SubmitDes {
            sender: self.sender.clone(),
            address: self.address.clone(),
            des: publics,
        })
        .await?;
        let total = self.keystore.add_des(privates)?;
        info!(submitted = count, stored = total, "DEs submitted");
        Ok(())
    }

    async fn round1(&self, group_id: GroupId) -> Result<()> {
        let group = self.group(group_id).await?;
        Self::expect_status(&group, GroupStatus::Round1)?;
        let member_id = self.member_id(&group)?;

        let mut session = DkgSession::new(group_id, member_id, group.group.shape(), group.group.dkg_context)?;
        let round1 = session.round1(&mut OsRng)?;
        // Persist first so a lost response can't orphan the secrets
        self.keystore.save_session(&session)?;

        self.execute(Command::SubmitDkgRound1 {
            sender: self.sender.clone(),
            address: self.address.clone(),
            group_id,
            round1,
        })
        .await?;
        info!(group_id, member_id, "round 1 submitted");
        Ok(())
    }

    async fn round2(&self, group_id: GroupId) -> Result<()> {
        let group = self.group(group_id).await?;
        Self::expect_status(&group, GroupStatus::Round2)?;
        let session = self
            .keystore
            .session(group_id)?
            .ok_or_else(|| anyhow!("no DKG session for group {group_id}"))?;

        let round2 = session.round2(&group.round1s)?;
        self.execute(Command::SubmitDkgRound2 {
            sender: self.sender.clone(),
            address: self.address.clone(),
            group_id,
            round2,
        })
        .await?;
        info!(group_id, member_id = session.member_id, "round 2 submitted");
        Ok(())
    }

    async fn round3(&self, group_id: GroupId) -> Result<()> {
        let group = self.group(group_id).await?;
        Self::expect_status(&group, GroupStatus::Round3)?;
        let session = self
            .keystore
            .session(group_id)?
            .ok_or_else(|| anyhow!("no DKG session for group {group_id}"))?;

        let (share, message) = session.round3(&group.round1s, &group.round2s, &mut OsRng)?;
        if let Some(share) = &share {
            self.keystore.save_share(share)?;
        }

        match message {
            Round3Message::Confirm(confirm) => {
                self.execute(Command::Confirm {
                    sender: self.sender.clone(),
                    address: self.address.clone(),
                    group_id,
                    confirm,
                })
                .await?;
                if let Some(share) = share {
                    println!("Group Public Key: {}", share.group_pub_key);
                }
            }
            Round3Message::Complaints(complaints) => {
                warn!(group_id, complaints = complaints.len(), "filing complaints");
                self.execute(Command::Complain {
                    sender: self.sender.clone(),
                    address: self.address.clone(),
                    group_id,
                    complaints,
                })
                .await?;
            }
        }
        Ok(())
    }

    async fn sign(&self, signing_id: SigningId) -> Result<()> {
        let SigningResult { signing, .. } = self.signing(signing_id).await?;
        if !signing.status.is_pending() {
            bail!("signing {signing_id} is {:?}", signing.status);
        }
        let assigned = signing
            .assigned_members
            .iter()
            .find(|m| m.address == self.address)
            .ok_or_else(|| anyhow!("{} is not assigned to signing {signing_id}", self.address))?;

        let share = self
            .keystore
            .share(signing.group_id)?
            .ok_or_else(|| anyhow!("no key share for group {}", signing.group_id))?;
        let committed = De {
            pub_d: assigned.pub_d,
            pub_e: assigned.pub_e,
        };
        let de = self
            .keystore
            .find_de(&committed)?
            .ok_or_else(|| anyhow!("committed DE not found locally"))?;

        let partial = create_partial_signature(&share, &de, signing_id, &signing.content, &signing.commitments())?;
        self.keystore.remove_de(&committed)?;

        self.execute(Command::SubmitSignature {
            sender: self.sender.clone(),
            address: self.address.clone(),
            signing_id,
            member_id: assigned.member_id,
            signature: partial.z,
        })
        .await?;
        info!(signing_id, member_id = assigned.member_id, "partial signature submitted");
        Ok(())
    }

    async fn show_info(&self) -> Result<()> {
        let status = match self
            .client
            .query(&Query::MemberStatus {
                address: self.address.clone(),
            })
            .await?
        {
            QueryResponse::MemberStatus(status) => status,
            other => bail!("unexpected response {other:?}"),
        };
        let de_count = match self
            .client
            .query(&Query::DeCount {
                address: self.address.clone(),
            })
            .await?
        {
            QueryResponse::DeCount(count) => count,
            other => bail!("unexpected response {other:?}"),
        };

        println!("Member Info:");
        println!("  Address: {}", self.address);
        match status {
            Some(status) => {
                println!("  Active: {}", status.is_active);
                println!("  Jailed: {}", status.is_jailed);
                println!("  Last Active: {}", status.last_active);
            }
            None => println!("  Active: never activated"),
        }
        println!("  DEs on node: {de_count}");
        println!("  DEs stored locally: {}", self.keystore.des()?.len());
        Ok(())
    }
}
