//! Command and event handlers.
//!
//! Every handler opens its own unit of work scope on the context it is
//! given, and only writes that are committed before the scope closes are
//! kept.

use common::Secret;
use domain::{
    AuthenticateUser, CreateUser, DeleteUser, LogInUser, Manufacturer, NotifyNewAccount,
    NotifyRecoverPassword, RecordCapec, RecordCve, RecordCwe, RecordDevice, RecordPatch,
    RecoverUserPassword, ResetPassword, UpdateUser, UpdateUserPassword, User,
};
use futures_util::future::BoxFuture;

use crate::bootstrap::{Context, Services};
use crate::error::{Result, ServiceError};
use crate::registry::{HandlerRegistry, RegistryError};
use crate::reply::{Reply, UserView};
use crate::services::email;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 40;

/// Returns the handler table for every command and event.
pub fn registry() -> std::result::Result<HandlerRegistry<Services>, RegistryError> {
    let mut registry = HandlerRegistry::<Services>::new();
    registry
        .on_command(login_user)?
        .on_command(authenticate_user)?
        .on_command(create_user)?
        .on_command(update_user)?
        .on_command(update_user_password)?
        .on_command(recover_user_password)?
        .on_command(reset_password)?
        .on_command(delete_user)?
        .on_command(record_device)?
        .on_command(record_patch)?
        .on_command(record_cve)?
        .on_command(record_cwe)?
        .on_command(record_capec)?;
    registry
        .on_event(send_new_account_email)
        .on_event(send_password_recovery_email);
    registry.validate()?;
    Ok(registry)
}

fn check_password_length(password: &Secret) -> Result<()> {
    let length = password.expose().chars().count();
    if (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(ServiceError::InvalidPassword(format!(
            "must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters"
        )))
    }
}

pub fn login_user(cmd: LogInUser, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        let mut users = scope.users();

        let user = users
            .get(&cmd.email)
            .await?
            .ok_or(ServiceError::DoesNotExist)?;
        if !ctx.hasher.verify(&cmd.password, user.hashed_password()) {
            return Err(ServiceError::DoesNotExist);
        }
        if !user.is_active() {
            return Err(ServiceError::InactiveUser);
        }
        let user_id = user.id();

        let expires_in = ctx.settings.access_token_lifetime();
        let token = ctx.tokens.issue_access_token(user_id, expires_in).await;

        scope.close().await?;
        Ok(Reply::Token(token))
    })
}

pub fn authenticate_user(
    cmd: AuthenticateUser,
    ctx: &mut Context,
) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let user_id = ctx
            .tokens
            .verify_access_token(cmd.token.expose())
            .await
            .ok_or(ServiceError::InvalidToken)?;

        let mut scope = ctx.uow.begin().await?;
        let mut users = scope.users();
        let user = users
            .get_by_id(user_id)
            .await?
            .ok_or(ServiceError::DoesNotExist)?;
        if !user.is_active() {
            return Err(ServiceError::InactiveUser);
        }
        let view = UserView::from(&*user);

        scope.close().await?;
        Ok(Reply::User(view))
    })
}

pub fn create_user(cmd: CreateUser, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        let mut users = scope.users();

        if users.get(&cmd.email).await?.is_some() {
            return Err(ServiceError::AlreadyExists);
        }

        let hashed_password = ctx.hasher.hash(&cmd.password)?;
        let user = User::new(cmd.email, cmd.name, hashed_password, cmd.is_superuser);
        users.add(user)?.send_verification_email();

        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn update_user(cmd: UpdateUser, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        let mut users = scope.users();

        let user = users
            .get_by_id(cmd.id)
            .await?
            .ok_or(ServiceError::DoesNotExist)?;
        if let Some(name) = cmd.name {
            user.rename(name);
        }
        let current = user.email().clone();
        let moved = cmd
            .email
            .filter(|email| *email != current)
            .map(|email| user.moved_to(email));

        // The email is the natural key: re-key the account.
        if let Some(moved) = moved {
            if users.get(moved.email()).await?.is_some() {
                return Err(ServiceError::AlreadyExists);
            }
            users.remove(&current).await?;
            users.add(moved)?;
        }

        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn update_user_password(
    cmd: UpdateUserPassword,
    ctx: &mut Context,
) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        let mut users = scope.users();

        let user = users
            .get_by_id(cmd.id)
            .await?
            .ok_or(ServiceError::DoesNotExist)?;
        if !ctx.hasher.verify(&cmd.current_password, user.hashed_password()) {
            return Err(ServiceError::IncorrectPassword);
        }
        if cmd.current_password == cmd.new_password {
            return Err(ServiceError::SamePassword);
        }
        user.set_hashed_password(ctx.hasher.hash(&cmd.new_password)?);

        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn recover_user_password(
    cmd: RecoverUserPassword,
    ctx: &mut Context,
) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;

        scope
            .users()
            .get(&cmd.email)
            .await?
            .ok_or(ServiceError::DoesNotExist)?
            .send_password_recovery_email();

        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn reset_password(cmd: ResetPassword, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        check_password_length(&cmd.new_password)?;
        let email = ctx
            .tokens
            .verify_reset_token(cmd.token.expose())
            .await
            .ok_or(ServiceError::InvalidToken)?;

        let mut scope = ctx.uow.begin().await?;
        let mut users = scope.users();
        let user = users.get(&email).await?.ok_or(ServiceError::DoesNotExist)?;
        if !user.is_active() {
            return Err(ServiceError::InactiveUser);
        }
        user.set_hashed_password(ctx.hasher.hash(&cmd.new_password)?);

        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn delete_user(cmd: DeleteUser, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        let mut users = scope.users();

        let email = users
            .get_by_id(cmd.id)
            .await?
            .ok_or(ServiceError::DoesNotExist)?
            .email()
            .clone();
        users.remove(&email).await?;

        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn record_device(cmd: RecordDevice, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;

        if let Some(name) = &cmd.changes.manufacturer {
            let mut manufacturers = scope.manufacturers();
            if manufacturers.get(name).await?.is_none() {
                manufacturers.add(Manufacturer::new(name.clone()))?;
            }
        }
        scope.devices().add_or_update(cmd.changes).await?;

        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn record_patch(cmd: RecordPatch, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        scope.patches().add_or_update(cmd.changes).await?;
        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn record_cve(cmd: RecordCve, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        scope.cves().add_or_update(cmd.changes).await?;
        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn record_cwe(cmd: RecordCwe, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        scope.cwes().add_or_update(cmd.changes).await?;
        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn record_capec(cmd: RecordCapec, ctx: &mut Context) -> BoxFuture<'_, Result<Reply>> {
    Box::pin(async move {
        let mut scope = ctx.uow.begin().await?;
        scope.capecs().add_or_update(cmd.changes).await?;
        scope.commit().await?;
        scope.close().await?;
        Ok(Reply::None)
    })
}

pub fn send_new_account_email(
    event: NotifyNewAccount,
    ctx: &mut Context,
) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        if !ctx.settings.emails_enabled() {
            tracing::debug!(to = %event.email, "emails disabled, skipping new account email");
            return Ok(());
        }

        let message = email::new_account_email(&ctx.settings, &event.email);
        ctx.email_sender.send(message).await?;
        Ok(())
    })
}

pub fn send_password_recovery_email(
    event: NotifyRecoverPassword,
    ctx: &mut Context,
) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let expires_in = ctx.settings.reset_token_lifetime();
        let token = ctx.tokens.issue_reset_token(&event.email, expires_in).await;

        let message = email::reset_password_email(&ctx.settings, &event.email, &token);
        ctx.email_sender.send(message).await?;
        Ok(())
    })
}
