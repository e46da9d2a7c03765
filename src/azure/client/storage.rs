//! Storage account and file share endpoints.

use reqwest::{Method, Url};
use serde_json::Value;

use crate::azure::ApiError;
use crate::azure::api::{
    ApiFuture, FileShareResource, FileShareSpec, StorageAccountSpec, StorageApi,
};
use crate::metadata::Tags;

use super::models::{ShareWire, StorageAccountWire};
use super::{ArmClient, STORAGE_API_VERSION};

const STORAGE: &str = "Microsoft.Storage";

impl ArmClient {
    fn account_url(&self, resource_group: &str, account: &str) -> Result<Url, ApiError> {
        self.resource_group_url(
            resource_group,
            &["providers", STORAGE, "storageAccounts", account],
            STORAGE_API_VERSION,
        )
    }

    fn shares_url(
        &self,
        resource_group: &str,
        account: &str,
        share: Option<&str>,
    ) -> Result<Url, ApiError> {
        let mut segments = vec![
            "providers",
            STORAGE,
            "storageAccounts",
            account,
            "fileServices",
            "default",
            "shares",
        ];
        segments.extend(share);
        self.resource_group_url(resource_group, &segments, STORAGE_API_VERSION)
    }
}

fn with_metadata(mut url: Url) -> Url {
    url.query_pairs_mut().append_pair("$expand", "metadata");
    url
}

impl StorageApi for ArmClient {
    fn storage_account_exists<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
    ) -> ApiFuture<'a, bool> {
        Box::pin(async move {
            let url = self.account_url(resource_group, account)?;
            match self.get_json::<Value>(url).await {
                Ok(_) => Ok(true),
                Err(err) if err.is_not_found() => Ok(false),
                Err(err) => Err(err),
            }
        })
    }

    fn create_storage_account<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        spec: &'a StorageAccountSpec,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.account_url(resource_group, account)?;
            self.mutate(Method::PUT, url, Some(&StorageAccountWire::from(spec)))
                .await?;
            Ok(())
        })
    }

    fn list_shares<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
    ) -> ApiFuture<'a, Vec<FileShareResource>> {
        Box::pin(async move {
            let url = self.shares_url(resource_group, account, None)?;
            let shares: Vec<ShareWire> = self.list_json(with_metadata(url)).await?;
            Ok(shares.into_iter().map(FileShareResource::from).collect())
        })
    }

    fn get_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
    ) -> ApiFuture<'a, FileShareResource> {
        Box::pin(async move {
            let url = self.shares_url(resource_group, account, Some(share))?;
            let wire: ShareWire = self.get_json(with_metadata(url)).await?;
            Ok(wire.into())
        })
    }

    fn create_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
        spec: &'a FileShareSpec,
    ) -> ApiFuture<'a, FileShareResource> {
        Box::pin(async move {
            let url = self.shares_url(resource_group, account, Some(share))?;
            self.mutate(Method::PUT, url.clone(), Some(&ShareWire::create(spec)))
                .await?;
            let wire: ShareWire = self.get_json(with_metadata(url)).await?;
            Ok(wire.into())
        })
    }

    fn update_share_metadata<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
        metadata: &'a Tags,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.shares_url(resource_group, account, Some(share))?;
            self.mutate(Method::PATCH, url, Some(&ShareWire::metadata_only(metadata)))
                .await
        })
    }

    fn delete_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.shares_url(resource_group, account, Some(share))?;
            self.mutate::<Value>(Method::DELETE, url, None).await
        })
    }
}
