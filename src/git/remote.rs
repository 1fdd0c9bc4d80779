//! git::remote
//!
//! Network transport: clone, fetch, push, and remote configuration.
//!
//! Transfers report progress through libgit2 callbacks; the same callbacks
//! check an interrupt flag so a cancelled task stops at the next progress
//! report instead of running to completion.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::interface::{Git, GitError};
use crate::core::types::{BranchName, RefName};

/// Per-request transport credentials.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// PEM private key content (not a path)
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub passphrase: Option<String>,
}

/// Overall result of a fetch or push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// At least one ref moved
    Ok,
    /// Nothing to transfer
    UpToDate,
    /// The update would lose remote history
    RejectedNonFastForward,
    /// The remote refused for another reason
    RejectedOther,
}

/// One ref moved by a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub refname: String,
    /// Previous target (`None` for newly created refs)
    pub old: Option<String>,
    /// New target (`None` for deleted refs)
    pub new: Option<String>,
}

/// Outcome of a fetch or push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    /// Remote's rejection message, if any
    pub message: Option<String>,
    pub updates: Vec<RefUpdate>,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub url: Option<String>,
    pub push_url: Option<String>,
}

/// A remote to add.
#[derive(Debug, Clone)]
pub struct RemoteSpec<'a> {
    pub name: &'a str,
    pub url: &'a str,
    /// Replaces the default `+refs/heads/*:refs/remotes/<name>/*`
    pub fetch_refspec: Option<&'a str>,
    pub push_url: Option<&'a str>,
    pub push_refspec: Option<&'a str>,
}

/// Push request.
#[derive(Debug, Clone)]
pub struct PushSpec<'a> {
    pub remote: &'a str,
    /// Local ref or revision to push (`HEAD`, `main`, `refs/heads/main`)
    pub src: &'a str,
    /// Remote branch to update
    pub branch: &'a BranchName,
    pub tags: bool,
    pub force: bool,
}

const MAX_AUTH_ATTEMPTS: usize = 3;

/// Callbacks wired to credentials and an interrupt flag.
fn callbacks<'a>(creds: &'a Credentials, interrupt: &'a AtomicBool) -> git2::RemoteCallbacks<'a> {
    let attempts = Cell::new(0usize);
    let mut cb = git2::RemoteCallbacks::new();

    cb.credentials(move |_url, username_from_url, allowed| {
        attempts.set(attempts.get() + 1);
        if attempts.get() > MAX_AUTH_ATTEMPTS {
            return Err(git2::Error::new(
                git2::ErrorCode::Auth,
                git2::ErrorClass::Net,
                "credentials rejected",
            ));
        }
        let user = creds
            .username
            .as_deref()
            .or(username_from_url)
            .unwrap_or("git");

        if allowed.contains(git2::CredentialType::SSH_KEY) {
            if let Some(key) = &creds.private_key {
                return git2::Cred::ssh_key_from_memory(
                    user,
                    creds.public_key.as_deref(),
                    key,
                    creds.passphrase.as_deref(),
                );
            }
        }
        if allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
            if let (Some(name), Some(password)) = (&creds.username, &creds.password) {
                return git2::Cred::userpass_plaintext(name, password);
            }
        }
        if allowed.contains(git2::CredentialType::USERNAME) {
            return git2::Cred::username(user);
        }
        if allowed.contains(git2::CredentialType::SSH_KEY) {
            return git2::Cred::ssh_key_from_agent(user);
        }
        git2::Cred::default()
    });

    cb.transfer_progress(move |_| !interrupt.load(Ordering::Relaxed));
    cb.sideband_progress(move |_| !interrupt.load(Ordering::Relaxed));
    cb
}

fn interrupted(interrupt: &AtomicBool) -> Result<(), GitError> {
    if interrupt.load(Ordering::Relaxed) {
        Err(GitError::Cancelled)
    } else {
        Ok(())
    }
}

impl Git {
    /// Clone `url` into `dest`, checking out `branch` (the remote's default
    /// branch when `None`).
    pub fn clone_into(
        url: &str,
        dest: &Path,
        branch: Option<&str>,
        creds: &Credentials,
        interrupt: &AtomicBool,
    ) -> Result<Git, GitError> {
        interrupted(interrupt)?;
        let mut fetch = git2::FetchOptions::new();
        fetch.remote_callbacks(callbacks(creds, interrupt));

        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch);
        if let Some(branch) = branch {
            builder.branch(branch);
        }
        let repo = builder
            .clone(url, dest)
            .map_err(|e| GitError::from_git2(e, url))?;
        tracing::info!(url, dest = %dest.display(), "cloned repository");
        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }
        Ok(Git { repo })
    }

    /// Configured remotes, sorted by name.
    pub fn list_remotes(&self) -> Result<Vec<RemoteEntry>, GitError> {
        let mut out = Vec::new();
        for name in self.repo.remotes()?.iter().flatten() {
            let remote = self.repo.find_remote(name)?;
            out.push(RemoteEntry {
                name: name.to_string(),
                url: remote.url().map(str::to_string),
                push_url: remote.pushurl().map(str::to_string),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Look up one remote.
    pub fn find_remote(&self, name: &str) -> Result<RemoteEntry, GitError> {
        let remote = self
            .repo
            .find_remote(name)
            .map_err(|_| GitError::RefNotFound {
                refname: format!("remote {name}"),
            })?;
        Ok(RemoteEntry {
            name: name.to_string(),
            url: remote.url().map(str::to_string),
            push_url: remote.pushurl().map(str::to_string),
        })
    }

    /// Configure a new remote.
    pub fn add_remote(&self, spec: &RemoteSpec<'_>) -> Result<RemoteEntry, GitError> {
        if !git2::Remote::is_valid_name(spec.name) {
            return Err(GitError::InvalidArgument {
                message: format!("'{}' is not a valid remote name", spec.name),
            });
        }
        let context = format!("remote {}", spec.name);
        let created = match spec.fetch_refspec {
            Some(refspec) => self.repo.remote_with_fetch(spec.name, spec.url, refspec),
            None => self.repo.remote(spec.name, spec.url),
        };
        created.map_err(|e| GitError::from_git2(e, &context))?;
        if let Some(url) = spec.push_url {
            self.repo.remote_set_pushurl(spec.name, Some(url))?;
        }
        if let Some(refspec) = spec.push_refspec {
            self.repo.remote_add_push(spec.name, refspec)?;
        }
        tracing::debug!(remote = spec.name, url = spec.url, "added remote");
        self.find_remote(spec.name)
    }

    /// Remove a remote with its tracking branches and configuration.
    pub fn remove_remote(&self, name: &str) -> Result<(), GitError> {
        self.find_remote(name)?;
        self.repo
            .remote_delete(name)
            .map_err(|e| GitError::from_git2(e, &format!("remote {name}")))?;
        tracing::debug!(remote = name, "removed remote");
        Ok(())
    }

    /// Fetch from `remote`; only `branch` when given, else the configured
    /// refspecs. `force` allows non-fast-forward updates of tracking refs.
    pub fn fetch(
        &self,
        remote: &str,
        branch: Option<&BranchName>,
        force: bool,
        creds: &Credentials,
        interrupt: &AtomicBool,
    ) -> Result<TransferOutcome, GitError> {
        interrupted(interrupt)?;
        let mut handle = self.repo.find_remote(remote).map_err(|_| GitError::RefNotFound {
            refname: format!("remote {remote}"),
        })?;

        let plus = if force { "+" } else { "" };
        let refspecs: Vec<String> = match branch {
            Some(branch) => {
                let tracking = RefName::for_remote_branch(remote, branch)?;
                vec![format!("{plus}{}:{tracking}", RefName::for_branch(branch))]
            }
            None if force => handle
                .fetch_refspecs()?
                .iter()
                .flatten()
                .map(|s| format!("+{}", s.trim_start_matches('+')))
                .collect(),
            None => Vec::new(),
        };

        let updates = RefCell::new(Vec::new());
        {
            let mut cb = callbacks(creds, interrupt);
            cb.update_tips(|refname, old, new| {
                updates.borrow_mut().push(RefUpdate {
                    refname: refname.to_string(),
                    old: (!old.is_zero()).then(|| old.to_string()),
                    new: (!new.is_zero()).then(|| new.to_string()),
                });
                true
            });
            let mut opts = git2::FetchOptions::new();
            opts.remote_callbacks(cb);
            handle
                .fetch(&refspecs, Some(&mut opts), None)
                .map_err(|e| GitError::from_git2(e, remote))?;
        }

        let updates = updates.into_inner();
        tracing::debug!(remote, updated = updates.len(), "fetched");
        Ok(TransferOutcome {
            status: if updates.is_empty() {
                TransferStatus::UpToDate
            } else {
                TransferStatus::Ok
            },
            message: None,
            updates,
        })
    }

    /// Push `spec.src` to `refs/heads/<spec.branch>` on `spec.remote`.
    ///
    /// A non-fast-forward update without `force` is reported as
    /// [`TransferStatus::RejectedNonFastForward`], not as an error.
    pub fn push(&self, spec: &PushSpec<'_>, creds: &Credentials, interrupt: &AtomicBool) -> Result<TransferOutcome, GitError> {
        interrupted(interrupt)?;
        let mut handle = self
            .repo
            .find_remote(spec.remote)
            .map_err(|_| GitError::RefNotFound {
                refname: format!("remote {}", spec.remote),
            })?;

        let src = self
            .repo
            .resolve_reference_from_short_name(spec.src)
            .map_err(|e| GitError::from_git2(e, spec.src))?;
        let src_name = src.name().ok_or_else(|| GitError::InvalidRefName {
            message: format!("{} is not valid UTF-8", spec.src),
        })?;

        let plus = if spec.force { "+" } else { "" };
        let mut refspecs = vec![format!("{plus}{src_name}:{}", RefName::for_branch(spec.branch))];
        if spec.tags {
            refspecs.push(format!("{plus}refs/tags/*:refs/tags/*"));
        }

        let updates = RefCell::new(Vec::new());
        let rejection: RefCell<Option<String>> = RefCell::new(None);
        let result = {
            let mut cb = callbacks(creds, interrupt);
            cb.push_negotiation(|proposed| {
                let mut updates = updates.borrow_mut();
                for update in proposed {
                    if update.src() == update.dst() {
                        continue;
                    }
                    updates.push(RefUpdate {
                        refname: update.dst_refname().unwrap_or_default().to_string(),
                        old: (!update.src().is_zero()).then(|| update.src().to_string()),
                        new: (!update.dst().is_zero()).then(|| update.dst().to_string()),
                    });
                }
                if interrupt.load(Ordering::Relaxed) {
                    Err(git2::Error::from_str("push interrupted"))
                } else {
                    Ok(())
                }
            });
            cb.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejection
                        .borrow_mut()
                        .get_or_insert_with(|| format!("{refname}: {message}"));
                }
                Ok(())
            });
            let mut opts = git2::PushOptions::new();
            opts.remote_callbacks(cb);
            handle.push(&refspecs, Some(&mut opts))
        };

        match result {
            Ok(()) => {}
            Err(e) if e.code() == git2::ErrorCode::NotFastForward => {
                tracing::debug!(remote = spec.remote, branch = %spec.branch, "push rejected: non-fast-forward");
                return Ok(TransferOutcome {
                    status: TransferStatus::RejectedNonFastForward,
                    message: Some(e.message().to_string()),
                    updates: Vec::new(),
                });
            }
            Err(e) if interrupt.load(Ordering::Relaxed) => {
                tracing::debug!(error = e.message(), "push interrupted");
                return Err(GitError::Cancelled);
            }
            Err(e) => return Err(GitError::from_git2(e, spec.remote)),
        }

        if let Some(message) = rejection.into_inner() {
            let status = if message.contains("non-fast-forward") || message.contains("fetch first") {
                TransferStatus::RejectedNonFastForward
            } else {
                TransferStatus::RejectedOther
            };
            return Ok(TransferOutcome {
                status,
                message: Some(message),
                updates: Vec::new(),
            });
        }

        let updates = updates.into_inner();
        tracing::debug!(remote = spec.remote, branch = %spec.branch, updated = updates.len(), "pushed");
        Ok(TransferOutcome {
            status: if updates.is_empty() {
                TransferStatus::UpToDate
            } else {
                TransferStatus::Ok
            },
            message: None,
            updates,
        })
    }
}
