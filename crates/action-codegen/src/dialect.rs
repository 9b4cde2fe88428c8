//! Statement templates per dialect.
//!
//! Locators and values arrive already escaped for single-quoted JavaScript strings.

/// One statement per method, each terminated by a newline.
pub trait DialectWriter: Sync {
    fn wait_visible(&self, page: &str, locator: &str) -> String;
    fn click(&self, page: &str, locator: &str) -> String;
    fn fill(&self, page: &str, locator: &str, value: &str) -> String;
    fn set_inner_html(&self, page: &str, locator: &str, value: &str) -> String;
    fn select(&self, page: &str, locator: &str, value: &str) -> String;
    fn expect_text(&self, page: &str, locator: &str, expected: &str) -> String;
    fn expect_style(&self, page: &str, locator: &str, property: &str, expected: &str) -> String;
    fn expect_visible(&self, page: &str, locator: &str) -> String;
    fn pause(&self, page: &str, millis: u64) -> String;
}

/// Playwright locator chains.
pub struct FluentWriter;

impl FluentWriter {
    fn locator(page: &str, locator: &str) -> String {
        format!("{page}.locator('xpath={locator}')")
    }
}

impl DialectWriter for FluentWriter {
    fn wait_visible(&self, page: &str, locator: &str) -> String {
        format!(
            "await {}.waitFor({{ state: 'visible' }});\n",
            Self::locator(page, locator)
        )
    }

    fn click(&self, page: &str, locator: &str) -> String {
        format!("await {}.click();\n", Self::locator(page, locator))
    }

    fn fill(&self, page: &str, locator: &str, value: &str) -> String {
        format!("await {}.fill('{value}');\n", Self::locator(page, locator))
    }

    fn set_inner_html(&self, page: &str, locator: &str, value: &str) -> String {
        format!(
            "await {}.evaluate((el) => {{ el.innerHTML = '{value}'; }});\n",
            Self::locator(page, locator)
        )
    }

    fn select(&self, page: &str, locator: &str, value: &str) -> String {
        format!(
            "await {}.selectOption('{value}');\n",
            Self::locator(page, locator)
        )
    }

    fn expect_text(&self, page: &str, locator: &str, expected: &str) -> String {
        format!(
            "await expect({}).toHaveText('{expected}');\n",
            Self::locator(page, locator)
        )
    }

    fn expect_style(&self, page: &str, locator: &str, property: &str, expected: &str) -> String {
        format!(
            "await expect({}).toHaveCSS('{property}', '{expected}');\n",
            Self::locator(page, locator)
        )
    }

    fn expect_visible(&self, page: &str, locator: &str) -> String {
        format!(
            "await expect({}).toBeVisible();\n",
            Self::locator(page, locator)
        )
    }

    fn pause(&self, page: &str, millis: u64) -> String {
        format!("await {page}.waitForTimeout({millis});\n")
    }
}

/// Puppeteer page methods with `xpath/` selectors.
pub struct SelectorWriter;

impl DialectWriter for SelectorWriter {
    fn wait_visible(&self, page: &str, locator: &str) -> String {
        format!("await {page}.waitForSelector('xpath/{locator}', {{ visible: true }});\n")
    }

    fn click(&self, page: &str, locator: &str) -> String {
        format!("await {page}.click('xpath/{locator}');\n")
    }

    fn fill(&self, page: &str, locator: &str, value: &str) -> String {
        format!("await {page}.type('xpath/{locator}', '{value}');\n")
    }

    fn set_inner_html(&self, page: &str, locator: &str, value: &str) -> String {
        format!(
            "await {page}.$eval('xpath/{locator}', (el) => {{ el.innerHTML = '{value}'; }});\n"
        )
    }

    fn select(&self, page: &str, locator: &str, value: &str) -> String {
        format!("await {page}.select('xpath/{locator}', '{value}');\n")
    }

    fn expect_text(&self, page: &str, locator: &str, expected: &str) -> String {
        format!(
            "expect(await {page}.$eval('xpath/{locator}', (el) => el.textContent.trim())).toBe('{expected}');\n"
        )
    }

    fn expect_style(&self, page: &str, locator: &str, property: &str, expected: &str) -> String {
        format!(
            "expect(await {page}.$eval('xpath/{locator}', (el) => getComputedStyle(el).getPropertyValue('{property}'))).toBe('{expected}');\n"
        )
    }

    fn expect_visible(&self, page: &str, locator: &str) -> String {
        format!(
            "expect(await {page}.waitForSelector('xpath/{locator}', {{ visible: true }})).toBeTruthy();\n"
        )
    }

    fn pause(&self, _page: &str, millis: u64) -> String {
        format!("await new Promise((resolve) => setTimeout(resolve, {millis}));\n")
    }
}
